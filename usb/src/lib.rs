pub use rusb;
pub mod error;
pub mod errorstack;
pub mod ptp;
pub mod service;

pub mod device;
