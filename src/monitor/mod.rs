pub mod detection;
pub mod recording;
pub mod sensing;
