use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Serialize, Deserialize};

use super::error::Error;

/// Message correlation token carried in every wire frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MsgId(pub [u8; 16]);

impl MsgId {
    /// Generates a new random message id
    pub fn random() -> Self {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        let mut bytes = [0u8; 16];
        rng.fill(&mut bytes);
        MsgId(bytes)
    }
}

impl fmt::Display for MsgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

/// Six-byte link-layer address of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkAddress(pub [u8; 6]);

impl LinkAddress {
    /// The link broadcast address
    pub const BROADCAST: LinkAddress = LinkAddress([0xFF; 6]);

    /// Returns whether this is the broadcast address
    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }
}

impl fmt::Display for LinkAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

impl FromStr for LinkAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 6];
        let mut count = 0;
        for (i, part) in s.split(':').enumerate() {
            if i >= 6 {
                return Err(Error::framing(format!("link address has too many octets: {}", s)));
            }
            bytes[i] = u8::from_str_radix(part, 16)
                .map_err(|_| Error::framing(format!("invalid link address octet: {}", s)))?;
            count += 1;
        }
        if count != 6 {
            return Err(Error::framing(format!("link address has too few octets: {}", s)));
        }
        Ok(LinkAddress(bytes))
    }
}

/// Role a node plays in the controller network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeRole {
    /// Coordinates registration and runs the poll cycle
    Master,
    /// Registers with a master and answers polls
    Padawan,
}

/// A remote node known to the local node
#[derive(Debug, Clone)]
pub struct Peer {
    /// Stable id assigned when the peer was cached
    pub id: u8,
    /// Display name, at most 15 characters
    pub name: String,
    /// Link-layer address
    pub address: LinkAddress,
    /// Pairing key, reserved for future link encryption
    pub crypto_key: [u8; 16],
    /// Whether the peer completed registration
    pub paired: bool,
    /// Whether a poll ack was seen from this peer in the current cycle
    pub poll_ack_this_cycle: bool,
}

/// Process-wide session identity, set once at init
///
/// The fingerprint is the one mutable field: it is bumped whenever the local
/// hardware configuration changes, and both the network-facing and the
/// configuration-facing tasks touch it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Local link-layer address
    pub address: LinkAddress,
    /// Local display name
    pub name: String,
    /// Opaque token for the current hardware-configuration version
    pub fingerprint: String,
    /// Role this node plays
    pub role: NodeRole,
}

impl SessionConfig {
    /// Creates a session config, truncating the name to the protocol limit
    pub fn new(address: LinkAddress, name: impl Into<String>, fingerprint: impl Into<String>, role: NodeRole) -> Self {
        let mut name = name.into();
        name.truncate(super::MAX_NAME_LEN);
        SessionConfig {
            address,
            name,
            fingerprint: fingerprint.into(),
            role,
        }
    }
}

/// Tunable protocol parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Maximum number of non-broadcast peers to cache
    pub max_peers: usize,
    /// Window after which incomplete reassemblies are evicted
    pub reassembly_window: Duration,
    /// Bound on hand-offs to the radio driver task
    pub link_send_timeout: Duration,
    /// Bound on hand-offs to the interface event sink
    pub interface_send_timeout: Duration,
    /// Interval between master poll cycles
    pub poll_interval: Duration,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        ProtocolConfig {
            max_peers: super::MAX_PEERS,
            reassembly_window: Duration::from_millis(super::REASSEMBLY_WINDOW_MS),
            link_send_timeout: Duration::from_millis(100),
            interface_send_timeout: Duration::from_millis(250),
            poll_interval: Duration::from_secs(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_msg_id_random() {
        let id1 = MsgId::random();
        let id2 = MsgId::random();
        assert_ne!(id1, id2);
        assert_eq!(id1.to_string().len(), 32);
    }

    #[test]
    fn test_link_address_round_trip() {
        let addr = LinkAddress([0xAA, 0xBB, 0x0C, 0x1D, 0x2E, 0x3F]);
        let text = addr.to_string();
        assert_eq!(text, "AA:BB:0C:1D:2E:3F");
        let parsed: LinkAddress = text.parse().unwrap();
        assert_eq!(parsed, addr);
    }

    #[test]
    fn test_link_address_rejects_malformed() {
        assert!("AA:BB:CC".parse::<LinkAddress>().is_err());
        assert!("AA:BB:CC:DD:EE:FF:00".parse::<LinkAddress>().is_err());
        assert!("AA:BB:CC:DD:EE:GG".parse::<LinkAddress>().is_err());
    }

    #[test]
    fn test_broadcast_address() {
        assert!(LinkAddress::BROADCAST.is_broadcast());
        assert!(!LinkAddress([0; 6]).is_broadcast());
    }

    #[test]
    fn test_session_config_truncates_name() {
        let config = SessionConfig::new(
            LinkAddress([1; 6]),
            "a-very-long-padawan-name",
            "fp-1",
            NodeRole::Padawan,
        );
        assert_eq!(config.name.len(), crate::core::MAX_NAME_LEN);
    }

    #[test]
    fn test_protocol_config_serialization() {
        let config = ProtocolConfig::default();
        let encoded = serde_json::to_string(&config).unwrap();
        let decoded: ProtocolConfig = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.max_peers, config.max_peers);
        assert_eq!(decoded.reassembly_window, config.reassembly_window);
    }
}
