//! servonet: peer messaging protocol stack for a distributed animatronics
//! controller network.
//!
//! A master node and multiple padawan nodes communicate over a lossy,
//! MTU-limited wireless link. This library implements the protocol core:
//! a fixed-size fragmenting packet codec, a time-windowed fragment reassembly
//! tracker, a serial framing service for the wired host link, a peer registry,
//! and the per-peer session state machine that ties them together. Radio
//! drivers, persistence and hardware control live outside this crate and are
//! reached through channel boundaries.
pub mod core;

pub mod network;
pub mod protocol;
pub mod util;

// Re-export commonly used items
pub use crate::core::{Error, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
