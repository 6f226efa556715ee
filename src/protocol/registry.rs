use crate::core::{LinkAddress, Peer, MAX_NAME_LEN};

/// Set of peers known to the local node
///
/// Append-only for the life of a session and capped at a small fixed limit.
/// The broadcast address and the distinguished master address are synthetic
/// peers and are never stored in the list; the master gets a dedicated slot.
#[derive(Debug)]
pub struct PeerRegistry {
    peers: Vec<Peer>,
    master: LinkAddress,
    capacity: usize,
}

impl PeerRegistry {
    /// Creates an empty registry with the given peer cap
    pub fn new(capacity: usize) -> Self {
        PeerRegistry {
            peers: Vec::new(),
            master: LinkAddress::BROADCAST,
            capacity,
        }
    }

    /// Address of the current master, broadcast until one is known
    pub fn master_address(&self) -> LinkAddress {
        self.master
    }

    /// Records the master's address
    pub fn set_master(&mut self, addr: LinkAddress) {
        self.master = addr;
    }

    /// Returns whether the address is already cached
    pub fn find_peer(&self, addr: LinkAddress) -> bool {
        self.peers.iter().any(|p| p.address == addr)
    }

    /// Caches a peer, assigning it the next stable id
    ///
    /// Idempotent: returns true without mutation when the address is already
    /// present. Returns false when the cache is full or the address is the
    /// broadcast address.
    pub fn cache_peer(&mut self, addr: LinkAddress, name: &str) -> bool {
        if addr.is_broadcast() {
            return false;
        }
        if self.find_peer(addr) {
            return true;
        }
        if self.peers.len() >= self.capacity {
            return false;
        }

        let mut name = name.to_string();
        name.truncate(MAX_NAME_LEN);
        self.peers.push(Peer {
            id: self.peers.len() as u8,
            name,
            address: addr,
            crypto_key: [0u8; 16],
            paired: true,
            poll_ack_this_cycle: false,
        });
        true
    }

    /// Marks the peer as having answered the current poll cycle
    pub fn mark_poll_ack(&mut self, addr: LinkAddress) -> bool {
        match self.peers.iter_mut().find(|p| p.address == addr) {
            Some(peer) => {
                peer.poll_ack_this_cycle = true;
                true
            }
            None => false,
        }
    }

    /// Clears every peer's poll-ack flag, done when a new cycle starts
    pub fn clear_poll_flags(&mut self) {
        for peer in &mut self.peers {
            peer.poll_ack_this_cycle = false;
        }
    }

    /// Collects peers that never acked this cycle, then clears all flags
    pub fn reset_poll_flags_and_collect_non_responders(&mut self) -> Vec<Peer> {
        let non_responders: Vec<Peer> = self
            .peers
            .iter()
            .filter(|p| !p.poll_ack_this_cycle)
            .cloned()
            .collect();
        self.clear_poll_flags();
        non_responders
    }

    /// Cached peers in id order
    pub fn peers(&self) -> &[Peer] {
        &self.peers
    }

    /// Number of cached peers
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Returns whether no peers are cached
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(seed: u8) -> LinkAddress {
        LinkAddress([seed; 6])
    }

    #[test]
    fn test_cache_peer_assigns_sequential_ids() {
        let mut registry = PeerRegistry::new(10);
        assert!(registry.cache_peer(addr(1), "dome"));
        assert!(registry.cache_peer(addr(2), "left-arm"));
        assert_eq!(registry.peers()[0].id, 0);
        assert_eq!(registry.peers()[1].id, 1);
    }

    #[test]
    fn test_cache_peer_is_idempotent() {
        let mut registry = PeerRegistry::new(10);
        assert!(registry.cache_peer(addr(1), "dome"));
        assert!(registry.cache_peer(addr(1), "other-name"));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.peers()[0].name, "dome");
    }

    #[test]
    fn test_cache_peer_enforces_capacity() {
        let mut registry = PeerRegistry::new(2);
        assert!(registry.cache_peer(addr(1), "a"));
        assert!(registry.cache_peer(addr(2), "b"));
        assert!(!registry.cache_peer(addr(3), "c"));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_cache_peer_refuses_broadcast() {
        let mut registry = PeerRegistry::new(10);
        assert!(!registry.cache_peer(LinkAddress::BROADCAST, "everyone"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_cache_peer_truncates_name() {
        let mut registry = PeerRegistry::new(10);
        registry.cache_peer(addr(1), "name-that-goes-on-and-on");
        assert_eq!(registry.peers()[0].name.len(), MAX_NAME_LEN);
    }

    #[test]
    fn test_poll_flag_cycle() {
        let mut registry = PeerRegistry::new(10);
        registry.cache_peer(addr(1), "dome");
        registry.cache_peer(addr(2), "left-arm");

        assert!(registry.mark_poll_ack(addr(1)));
        assert!(!registry.mark_poll_ack(addr(9)));

        let non_responders = registry.reset_poll_flags_and_collect_non_responders();
        assert_eq!(non_responders.len(), 1);
        assert_eq!(non_responders[0].address, addr(2));
        // every flag is down again afterwards
        assert!(registry.peers().iter().all(|p| !p.poll_ack_this_cycle));
    }

    #[test]
    fn test_master_slot() {
        let mut registry = PeerRegistry::new(10);
        assert!(registry.master_address().is_broadcast());
        registry.set_master(addr(7));
        assert_eq!(registry.master_address(), addr(7));
        assert!(!registry.find_peer(addr(7)));
    }
}
