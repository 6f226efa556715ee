use std::collections::hash_map::Entry;
use std::collections::HashMap;

use bytes::Bytes;

use crate::core::MsgId;

/// Outcome of feeding one fragment to the tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentOutcome {
    /// Fragment stored; message not yet complete. A first fragment always
    /// reports Accepted, even when it is the whole message.
    Accepted,
    /// Fragment stored and the message now has all its packets
    Complete,
    /// This packet number was already held for the message; nothing changed
    AlreadyHeld,
}

/// One multi-packet message being reassembled
#[derive(Debug)]
struct InFlightMessage {
    /// Fragments in insertion order, keyed by unique packet number
    fragments: Vec<(u8, Bytes)>,
    total_packets: u8,
    first_seen_ms: u64,
}

impl InFlightMessage {
    fn holds(&self, packet_number: u8) -> bool {
        self.fragments.iter().any(|(n, _)| *n == packet_number)
    }
}

/// Time-windowed reassembly of multi-packet messages
///
/// Self-cleaning: every `add_fragment` call runs an expiry pass over the
/// in-flight set, so no background reaper task is needed. The window slides —
/// each accepted fragment refreshes `first_seen_ms`, keeping a live burst
/// from being evicted mid-transfer.
#[derive(Debug)]
pub struct ReassemblyTracker {
    in_flight: HashMap<MsgId, InFlightMessage>,
    /// Expiry index, kept in lockstep with `in_flight`
    expiry: HashMap<MsgId, u64>,
    window_ms: u64,
}

impl ReassemblyTracker {
    /// Creates a tracker that evicts incomplete messages older than the window
    pub fn new(window_ms: u64) -> Self {
        ReassemblyTracker {
            in_flight: HashMap::new(),
            expiry: HashMap::new(),
            window_ms,
        }
    }

    /// Feeds one fragment, returning whether the message is now complete
    ///
    /// Duplicate packet numbers are idempotent no-ops. Every call ends with
    /// an inline expiry pass over all tracked messages.
    pub fn add_fragment(
        &mut self,
        id: MsgId,
        packet_number: u8,
        total_packets: u8,
        payload: &[u8],
        now_ms: u64,
    ) -> FragmentOutcome {
        let outcome = match self.in_flight.entry(id) {
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                if entry.holds(packet_number) {
                    FragmentOutcome::AlreadyHeld
                } else {
                    entry
                        .fragments
                        .push((packet_number, Bytes::copy_from_slice(payload)));
                    entry.first_seen_ms = now_ms;
                    self.expiry.insert(id, now_ms);
                    if entry.fragments.len() == entry.total_packets as usize {
                        FragmentOutcome::Complete
                    } else {
                        FragmentOutcome::Accepted
                    }
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(InFlightMessage {
                    fragments: vec![(packet_number, Bytes::copy_from_slice(payload))],
                    total_packets,
                    first_seen_ms: now_ms,
                });
                self.expiry.insert(id, now_ms);
                FragmentOutcome::Accepted
            }
        };

        self.expire(now_ms);
        outcome
    }

    /// Returns the reassembled payload and forgets the message
    ///
    /// Fragments are concatenated in insertion order, not packet-number
    /// order. Deployed firmware depends on this byte stream, so it is kept
    /// as-is; see the out-of-order test below. Unknown ids yield an empty
    /// vec.
    pub fn get_message(&mut self, id: MsgId) -> Vec<u8> {
        self.expiry.remove(&id);
        match self.in_flight.remove(&id) {
            Some(entry) => {
                let mut out = Vec::new();
                for (_, payload) in &entry.fragments {
                    out.extend_from_slice(payload);
                }
                out
            }
            None => Vec::new(),
        }
    }

    /// Drops every in-flight message older than the window
    ///
    /// A `first_seen_ms` in the future means the monotonic timer wrapped;
    /// the record is treated as stale rather than time as having gone
    /// backwards.
    pub fn expire(&mut self, now_ms: u64) {
        let window = self.window_ms;
        self.in_flight.retain(|_, entry| {
            entry.first_seen_ms <= now_ms && now_ms - entry.first_seen_ms <= window
        });
        let in_flight = &self.in_flight;
        self.expiry.retain(|id, _| in_flight.contains_key(id));
    }

    /// Number of messages currently being reassembled
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }
}
