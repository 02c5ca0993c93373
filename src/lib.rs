//! YantraIO - EV3 robot remote-control daemon and navigation library
//!
//! This library provides the building blocks of the daemon: the brick
//! direct-command codec, the interchangeable transports, a typed motor and
//! sensor command layer, the TCP remote-control protocol, and the
//! dead-reckoning navigation engine.

pub mod config;
pub mod device;
pub mod error;
pub mod nav;
pub mod protocol;
pub mod remote;
pub mod transport;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{Error, Result};
