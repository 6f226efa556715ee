use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::core::{Error, LinkAddress, NodeRole, Peer, ProtocolConfig, Result, SessionConfig};
use crate::network::{InterfaceHandle, LinkHandle};
use crate::util::MonotonicClock;
use super::codec::PacketCodec;
use super::message::{InterfaceEvent, MessageKind, PeerMessage};
use super::reassembly::{FragmentOutcome, ReassemblyTracker};
use super::registry::PeerRegistry;
use super::UNIT_SEPARATOR;

/// Where the local node stands in the registration lifecycle
///
/// Only meaningful for padawans; a master is considered registered from
/// startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationState {
    /// No master known, nothing sent yet
    Unregistered,
    /// REGISTRATION_REQ broadcast, waiting for a matching REGISTRATION
    AwaitingAck,
    /// Master cached, participating in the poll cycle
    Registered,
}

/// Shared state of the protocol core
///
/// One explicit context instead of process-wide singletons: everything a
/// session handler touches lives here, so independent instances can coexist
/// (and be tested against each other). All locks are short-held; no lock is
/// held across a network send.
pub struct ProtocolContext {
    session: RwLock<SessionConfig>,
    registration: RwLock<RegistrationState>,
    registry: Mutex<PeerRegistry>,
    tracker: Mutex<ReassemblyTracker>,
    link: LinkHandle,
    interface: InterfaceHandle,
    clock: MonotonicClock,
}

impl ProtocolContext {
    /// Creates a context for one node
    pub fn new(
        session: SessionConfig,
        config: ProtocolConfig,
        link: LinkHandle,
        interface: InterfaceHandle,
    ) -> Self {
        let registration = match session.role {
            NodeRole::Master => RegistrationState::Registered,
            NodeRole::Padawan => RegistrationState::Unregistered,
        };
        ProtocolContext {
            session: RwLock::new(session),
            registration: RwLock::new(registration),
            registry: Mutex::new(PeerRegistry::new(config.max_peers)),
            tracker: Mutex::new(ReassemblyTracker::new(
                config.reassembly_window.as_millis() as u64,
            )),
            link,
            interface,
            clock: MonotonicClock::new(),
        }
    }
}

/// Interprets inbound frames and drives the registry, reassembly and
/// outbound replies
///
/// Cheap to clone; every task that touches the protocol (receive callback,
/// poll timer, public API) holds one.
#[derive(Clone)]
pub struct SessionHandler {
    ctx: Arc<ProtocolContext>,
}

impl SessionHandler {
    /// Creates a handler over a shared context
    pub fn new(ctx: Arc<ProtocolContext>) -> Self {
        SessionHandler { ctx }
    }

    /// Sole entry point for raw bytes arriving from the radio driver
    ///
    /// Nothing here is fatal: undecodable, unvalidated, incomplete or
    /// malformed input is logged and dropped.
    pub async fn on_receive(&self, src: LinkAddress, bytes: &[u8]) {
        let frame = match PacketCodec::decode(bytes) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("dropping undecodable frame from {}: {}", src, e);
                return;
            }
        };
        if frame.kind == MessageKind::Unknown {
            debug!("dropping unvalidated frame from {}", src);
            return;
        }
        let kind = frame.kind;
        let msg_id = frame.id;

        let payload = if frame.total_packets > 1 {
            let now_ms = self.ctx.clock.now_ms();
            let mut tracker = self.ctx.tracker.lock().await;
            match tracker.add_fragment(
                frame.id,
                frame.packet_number,
                frame.total_packets,
                &frame.payload,
                now_ms,
            ) {
                FragmentOutcome::Complete => tracker.get_message(frame.id),
                // incomplete reassembly stays silent until the last fragment
                FragmentOutcome::Accepted | FragmentOutcome::AlreadyHeld => return,
            }
        } else {
            frame.payload.to_vec()
        };

        let text = match String::from_utf8(payload) {
            Ok(text) => text,
            Err(e) => {
                warn!("dropping non-UTF-8 {} payload from {}: {}", kind.validator(), src, e);
                return;
            }
        };
        let message = match PeerMessage::parse(kind, &text) {
            Ok(message) => message,
            Err(e) => {
                warn!("dropping malformed payload from {}: {}", src, e);
                return;
            }
        };

        let role = self.ctx.session.read().await.role;
        match message {
            PeerMessage::RegistrationReq { name, .. } => {
                if role != NodeRole::Master {
                    debug!("ignoring REGISTRATION_REQ while not master");
                    return;
                }
                self.handle_registration_req(src, &name).await;
            }
            PeerMessage::Registration { target, name } => {
                if role != NodeRole::Padawan {
                    debug!("ignoring REGISTRATION while not padawan");
                    return;
                }
                self.handle_registration(src, &target, &name).await;
            }
            PeerMessage::RegistrationAck { name, .. } => {
                if role != NodeRole::Master {
                    debug!("ignoring REGISTRATION_ACK while not master");
                    return;
                }
                self.cache_and_register_peer(src, &name).await;
            }
            PeerMessage::Poll => {
                if role != NodeRole::Padawan {
                    debug!("ignoring POLL while not padawan");
                    return;
                }
                self.handle_poll(src).await;
            }
            PeerMessage::PollAck { name, fingerprint } => {
                if role != NodeRole::Master {
                    debug!("ignoring POLL_ACK while not master");
                    return;
                }
                self.ctx.registry.lock().await.mark_poll_ack(src);
                self.ctx
                    .interface
                    .forward(InterfaceEvent {
                        kind: MessageKind::PollAck,
                        origination_msg_id: msg_id.to_string(),
                        peer: src,
                        peer_name: name,
                        message: fingerprint,
                    })
                    .await;
            }
            PeerMessage::Command {
                kind,
                origination_msg_id,
                payload,
            } => {
                self.ctx
                    .interface
                    .forward(InterfaceEvent {
                        kind,
                        origination_msg_id,
                        peer: src,
                        peer_name: String::new(),
                        message: payload,
                    })
                    .await;
            }
            PeerMessage::Response {
                kind,
                origination_msg_id,
                name,
                message,
            } => {
                self.ctx
                    .interface
                    .forward(InterfaceEvent {
                        kind,
                        origination_msg_id,
                        peer: src,
                        peer_name: name,
                        message,
                    })
                    .await;
            }
        }
    }

    /// Master reaction to a registration request: cache the peer and
    /// broadcast a REGISTRATION naming it
    async fn handle_registration_req(&self, src: LinkAddress, name: &str) {
        self.cache_and_register_peer(src, name).await;

        let body = format!("{}{}{}", src, UNIT_SEPARATOR, name);
        match PacketCodec::encode(MessageKind::Registration, None, Some(&body)) {
            Ok(frames) => {
                self.ctx
                    .link
                    .send_frames(LinkAddress::BROADCAST, frames)
                    .await
            }
            Err(e) => warn!("failed to encode REGISTRATION: {}", e),
        }
    }

    /// Padawan reaction to a registration broadcast that names it
    async fn handle_registration(&self, src: LinkAddress, target: &str, _name: &str) {
        let (address, name) = {
            let session = self.ctx.session.read().await;
            (session.address, session.name.clone())
        };
        match target.parse::<LinkAddress>() {
            Ok(addr) if addr == address => {}
            Ok(_) => {
                debug!("ignoring REGISTRATION for another node");
                return;
            }
            Err(e) => {
                warn!("dropping REGISTRATION with bad target address: {}", e);
                return;
            }
        }

        self.ctx.registry.lock().await.set_master(src);
        *self.ctx.registration.write().await = RegistrationState::Registered;
        self.ctx.link.add_peer(src).await;

        match PacketCodec::encode(MessageKind::RegistrationAck, Some(address), Some(&name)) {
            Ok(frames) => self.ctx.link.send_frames(src, frames).await,
            Err(e) => warn!("failed to encode REGISTRATION_ACK: {}", e),
        }
    }

    /// Padawan reaction to a poll: answer with name and fingerprint
    async fn handle_poll(&self, src: LinkAddress) {
        let body = {
            let session = self.ctx.session.read().await;
            format!("{}{}{}", session.name, UNIT_SEPARATOR, session.fingerprint)
        };
        match PacketCodec::encode(MessageKind::PollAck, None, Some(&body)) {
            Ok(frames) => self.ctx.link.send_frames(src, frames).await,
            Err(e) => warn!("failed to encode POLL_ACK: {}", e),
        }
    }

    /// Caches a peer and, when first seen, registers it with the radio driver
    async fn cache_and_register_peer(&self, src: LinkAddress, name: &str) {
        let newly_seen = {
            let mut registry = self.ctx.registry.lock().await;
            let known = registry.find_peer(src);
            if !registry.cache_peer(src, name) && !known {
                warn!("peer cache full, not caching {}", src);
                return;
            }
            !known
        };
        if newly_seen {
            self.ctx.link.add_peer(src).await;
        }
    }

    /// Padawan: broadcast a registration request when no master is known
    pub async fn register_with_master(&self) {
        let (role, address, name) = {
            let session = self.ctx.session.read().await;
            (session.role, session.address, session.name.clone())
        };
        if role != NodeRole::Padawan {
            return;
        }
        if !self.ctx.registry.lock().await.master_address().is_broadcast() {
            return;
        }

        match PacketCodec::encode(MessageKind::RegistrationReq, Some(address), Some(&name)) {
            Ok(frames) => {
                self.ctx
                    .link
                    .send_frames(LinkAddress::BROADCAST, frames)
                    .await;
                *self.ctx.registration.write().await = RegistrationState::AwaitingAck;
            }
            Err(e) => warn!("failed to encode REGISTRATION_REQ: {}", e),
        }
    }

    /// Master: start a poll cycle
    ///
    /// Clears every peer's ack flag, then sends POLL to each cached peer.
    /// Addresses are collected under the lock; sends happen outside it.
    pub async fn poll_padawans(&self) {
        let (role, address) = {
            let session = self.ctx.session.read().await;
            (session.role, session.address)
        };
        if role != NodeRole::Master {
            return;
        }

        let addrs: Vec<LinkAddress> = {
            let mut registry = self.ctx.registry.lock().await;
            registry.clear_poll_flags();
            registry.peers().iter().map(|p| p.address).collect()
        };

        for addr in addrs {
            match PacketCodec::encode(MessageKind::Poll, Some(address), None) {
                Ok(frames) => self.ctx.link.send_frames(addr, frames).await,
                Err(e) => warn!("failed to encode POLL: {}", e),
            }
        }
    }

    /// Master: close the poll cycle, raising a nak per silent peer
    ///
    /// This is the sole liveness mechanism; there is no separate heartbeat.
    pub async fn poll_response_time_expired(&self) {
        if self.ctx.session.read().await.role != NodeRole::Master {
            return;
        }

        let non_responders = {
            let mut registry = self.ctx.registry.lock().await;
            registry.reset_poll_flags_and_collect_non_responders()
        };
        for peer in non_responders {
            self.ctx
                .interface
                .forward(InterfaceEvent {
                    kind: MessageKind::PollNak,
                    origination_msg_id: String::new(),
                    peer: peer.address,
                    peer_name: peer.name,
                    message: String::new(),
                })
                .await;
        }
    }

    /// Sends a command message (config, deploy, run, panic, format) to a peer
    pub async fn send_command(
        &self,
        dest: LinkAddress,
        kind: MessageKind,
        origination_msg_id: &str,
        payload: &str,
    ) -> Result<()> {
        if !kind.is_command() {
            return Err(Error::protocol(format!(
                "{} is not a command kind",
                kind.validator()
            )));
        }
        let body = format!("{}{}{}", origination_msg_id, UNIT_SEPARATOR, payload);
        let frames = PacketCodec::encode(kind, None, Some(&body))?;
        self.ctx.link.send_frames(dest, frames).await;
        Ok(())
    }

    /// Updates the local configuration fingerprint
    pub async fn set_fingerprint(&self, fingerprint: impl Into<String>) {
        self.ctx.session.write().await.fingerprint = fingerprint.into();
    }

    /// Current registration lifecycle state
    pub async fn registration_state(&self) -> RegistrationState {
        *self.ctx.registration.read().await
    }

    /// Address of the current master
    pub async fn master_address(&self) -> LinkAddress {
        self.ctx.registry.lock().await.master_address()
    }

    /// Snapshot of the cached peers, for roster replies on the serial side
    pub async fn peer_roster(&self) -> Vec<Peer> {
        self.ctx.registry.lock().await.peers().to_vec()
    }
}
