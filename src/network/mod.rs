//! Channel boundaries to the external collaborators
//!
//! The radio driver and the upstream business logic live outside this crate;
//! both are reached through bounded channels. Hand-offs never block
//! indefinitely: a bounded timeout downgrades to a logged drop, and retry,
//! if any, is the poll-cycle's responsibility.

use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::warn;

use crate::core::LinkAddress;
use crate::protocol::InterfaceEvent;

/// Commands handed to the radio driver task
#[derive(Debug, Clone)]
pub enum LinkCommand {
    /// Transmit pre-encoded frames to a destination address
    Send {
        dest: LinkAddress,
        frames: Vec<Bytes>,
    },
    /// Register a peer address with the radio driver
    AddPeer { addr: LinkAddress },
}

/// Handle for sending commands to the radio driver task
#[derive(Clone)]
pub struct LinkHandle {
    command_tx: mpsc::Sender<LinkCommand>,
    timeout: Duration,
}

impl LinkHandle {
    /// Creates a handle with the given hand-off bound
    pub fn new(command_tx: mpsc::Sender<LinkCommand>, timeout: Duration) -> Self {
        LinkHandle { command_tx, timeout }
    }

    /// Queues frames for transmission, dropping them if the driver is stalled
    pub async fn send_frames(&self, dest: LinkAddress, frames: Vec<Bytes>) {
        let count = frames.len();
        if let Err(e) = self
            .command_tx
            .send_timeout(LinkCommand::Send { dest, frames }, self.timeout)
            .await
        {
            warn!("dropping {} outbound frames for {}: {}", count, dest, e);
        }
    }

    /// Asks the driver to register a peer address
    pub async fn add_peer(&self, addr: LinkAddress) {
        if let Err(e) = self
            .command_tx
            .send_timeout(LinkCommand::AddPeer { addr }, self.timeout)
            .await
        {
            warn!("dropping peer registration for {}: {}", addr, e);
        }
    }
}

/// Handle for forwarding events to the interface queue
#[derive(Clone)]
pub struct InterfaceHandle {
    event_tx: mpsc::Sender<InterfaceEvent>,
    timeout: Duration,
}

impl InterfaceHandle {
    /// Creates a handle with the given hand-off bound
    pub fn new(event_tx: mpsc::Sender<InterfaceEvent>, timeout: Duration) -> Self {
        InterfaceHandle { event_tx, timeout }
    }

    /// Forwards an event upstream, dropping it if the consumer is stalled
    pub async fn forward(&self, event: InterfaceEvent) {
        if let Err(e) = self.event_tx.send_timeout(event, self.timeout).await {
            warn!("dropping interface event: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::MessageKind;

    #[tokio::test]
    async fn test_link_handle_delivers_commands() {
        let (tx, mut rx) = mpsc::channel(4);
        let handle = LinkHandle::new(tx, Duration::from_millis(50));

        handle
            .send_frames(LinkAddress::BROADCAST, vec![Bytes::from_static(b"frame")])
            .await;

        match rx.recv().await {
            Some(LinkCommand::Send { dest, frames }) => {
                assert!(dest.is_broadcast());
                assert_eq!(frames.len(), 1);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stalled_consumer_drops_instead_of_blocking() {
        let (tx, _rx) = mpsc::channel(1);
        let handle = InterfaceHandle::new(tx, Duration::from_millis(10));

        let event = InterfaceEvent {
            kind: MessageKind::PollNak,
            origination_msg_id: String::new(),
            peer: LinkAddress([1; 6]),
            peer_name: "dome".to_string(),
            message: String::new(),
        };

        // first fills the channel, second must time out and drop
        handle.forward(event.clone()).await;
        handle.forward(event).await;
    }
}
