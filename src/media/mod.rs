//! Video/image plumbing around the monitor: frames and overlay, camera
//! capture, video sinks, and the on-disk artifact store.

pub mod frame;
pub mod capture;
pub mod sink;
pub mod store;
