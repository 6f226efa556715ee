//! Core types and constants for the servonet protocol
//!
//! This module contains the fundamental building blocks used throughout the
//! library.

pub mod error;
pub mod types;

pub use self::error::{Error, Result};
pub use self::types::{
    LinkAddress,
    MsgId,
    NodeRole,
    Peer,
    ProtocolConfig,
    SessionConfig,
};

/// Fixed MTU of the wireless link in bytes
pub const LINK_MTU: usize = 180;

/// Size of the wire frame header in bytes: id[16] + packet_number + total_packets + kind + payload_size
pub const FRAME_HEADER_SIZE: usize = 20;

/// Maximum number of non-broadcast peers a node will cache
pub const MAX_PEERS: usize = 10;

/// Maximum length of a peer display name in characters
pub const MAX_NAME_LEN: usize = 15;

/// Window after which an incomplete multi-fragment message is evicted
pub const REASSEMBLY_WINDOW_MS: u64 = 1000;
