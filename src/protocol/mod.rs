//! Protocol implementation module
//!
//! This module defines the servonet wire frames, message types,
//! encoding/decoding, fragment reassembly, serial framing and the peer
//! session state machine.

pub mod codec;
pub mod message;
pub mod reassembly;
pub mod registry;
pub mod serial;
pub mod state;

pub use self::codec::{Frame, PacketCodec};
pub use self::message::{InterfaceEvent, MessageKind, PeerMessage};
pub use self::reassembly::{FragmentOutcome, ReassemblyTracker};
pub use self::registry::PeerRegistry;
pub use self::serial::{SerialCodec, SerialHeader};
pub use self::state::{ProtocolContext, RegistrationState, SessionHandler};

// Delimiters shared by the wire payload format and the serial framing.
// These are raw ASCII control bytes and are never escaped, so payload text
// must not contain them.

/// Group separator, delimits header from payload in serial messages
pub const GROUP_SEPARATOR: char = '\u{1d}';

/// Record separator, delimits header tokens and roster records
pub const RECORD_SEPARATOR: char = '\u{1e}';

/// Unit separator, delimits fields within a record or payload
pub const UNIT_SEPARATOR: char = '\u{1f}';
