pub mod gpio;
pub mod indicators;
