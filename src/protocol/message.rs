use crate::core::{Error, LinkAddress, Result};
use super::UNIT_SEPARATOR;

/// Wire message types, carried as the ordinal in the frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageKind {
    /// Frame whose type ordinal or validator did not check out
    Unknown = 0,
    /// Padawan asks to join the network
    RegistrationReq = 1,
    /// Master broadcasts a registration targeting one padawan
    Registration = 2,
    /// Padawan confirms a registration
    RegistrationAck = 3,
    /// Master liveness probe
    Poll = 4,
    /// Padawan answer carrying name and fingerprint
    PollAck = 5,
    /// Raised locally when a padawan misses a poll cycle
    PollNak = 6,
    /// Hardware configuration push
    Config = 7,
    ConfigAck = 8,
    ConfigNak = 9,
    /// Animation script transfer
    ScriptDeploy = 10,
    ScriptDeployAck = 11,
    ScriptDeployNak = 12,
    /// Run a previously deployed script
    ScriptRun = 13,
    ScriptRunAck = 14,
    ScriptRunNak = 15,
    /// Emergency stop, all servos to rest
    PanicStop = 16,
    /// Reformat a padawan's storage
    FormatSd = 17,
    FormatSdAck = 18,
    FormatSdNak = 19,
}

impl MessageKind {
    /// Converts a wire ordinal to a message kind, Unknown if out of range
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => MessageKind::RegistrationReq,
            2 => MessageKind::Registration,
            3 => MessageKind::RegistrationAck,
            4 => MessageKind::Poll,
            5 => MessageKind::PollAck,
            6 => MessageKind::PollNak,
            7 => MessageKind::Config,
            8 => MessageKind::ConfigAck,
            9 => MessageKind::ConfigNak,
            10 => MessageKind::ScriptDeploy,
            11 => MessageKind::ScriptDeployAck,
            12 => MessageKind::ScriptDeployNak,
            13 => MessageKind::ScriptRun,
            14 => MessageKind::ScriptRunAck,
            15 => MessageKind::ScriptRunNak,
            16 => MessageKind::PanicStop,
            17 => MessageKind::FormatSd,
            18 => MessageKind::FormatSdAck,
            19 => MessageKind::FormatSdNak,
            _ => MessageKind::Unknown,
        }
    }

    /// The per-type ASCII validator embedded as the first payload token
    pub fn validator(&self) -> &'static str {
        match self {
            MessageKind::Unknown => "UNKNOWN",
            MessageKind::RegistrationReq => "REGISTRATION_REQ",
            MessageKind::Registration => "REGISTRATION",
            MessageKind::RegistrationAck => "REGISTRATION_ACK",
            MessageKind::Poll => "POLL",
            MessageKind::PollAck => "POLL_ACK",
            MessageKind::PollNak => "POLL_NAK",
            MessageKind::Config => "CONFIG",
            MessageKind::ConfigAck => "CONFIG_ACK",
            MessageKind::ConfigNak => "CONFIG_NAK",
            MessageKind::ScriptDeploy => "SCRIPT_DEPLOY",
            MessageKind::ScriptDeployAck => "SCRIPT_DEPLOY_ACK",
            MessageKind::ScriptDeployNak => "SCRIPT_DEPLOY_NAK",
            MessageKind::ScriptRun => "SCRIPT_RUN",
            MessageKind::ScriptRunAck => "SCRIPT_RUN_ACK",
            MessageKind::ScriptRunNak => "SCRIPT_RUN_NAK",
            MessageKind::PanicStop => "PANIC_STOP",
            MessageKind::FormatSd => "FORMAT_SD",
            MessageKind::FormatSdAck => "FORMAT_SD_ACK",
            MessageKind::FormatSdNak => "FORMAT_SD_NAK",
        }
    }

    /// Whether this kind carries a command payload (orig msg id + fields)
    pub fn is_command(&self) -> bool {
        matches!(
            self,
            MessageKind::Config
                | MessageKind::ScriptDeploy
                | MessageKind::ScriptRun
                | MessageKind::PanicStop
                | MessageKind::FormatSd
        )
    }

    /// Whether this kind is an ack/nak response to a command
    pub fn is_response(&self) -> bool {
        matches!(
            self,
            MessageKind::ConfigAck
                | MessageKind::ConfigNak
                | MessageKind::ScriptDeployAck
                | MessageKind::ScriptDeployNak
                | MessageKind::ScriptRunAck
                | MessageKind::ScriptRunNak
                | MessageKind::FormatSdAck
                | MessageKind::FormatSdNak
        )
    }
}

/// A fully reassembled, validator-checked peer message
///
/// Each variant carries only the fields its handler needs; the raw
/// unit-separated payload text never leaves the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerMessage {
    /// Padawan announcing itself: own address and name
    RegistrationReq { mac: String, name: String },
    /// Master registration broadcast: target address and echoed name
    Registration { target: String, name: String },
    /// Padawan confirming registration: own address and name
    RegistrationAck { mac: String, name: String },
    /// Liveness probe, no fields beyond the sender
    Poll,
    /// Poll answer: name and configuration fingerprint
    PollAck { name: String, fingerprint: String },
    /// Command to execute: originating message id plus opaque fields
    Command {
        kind: MessageKind,
        origination_msg_id: String,
        payload: String,
    },
    /// Ack or nak for an earlier command
    Response {
        kind: MessageKind,
        origination_msg_id: String,
        name: String,
        message: String,
    },
}

impl PeerMessage {
    /// Parses a validator-stripped payload into a typed message
    ///
    /// Field counts are checked here; a mismatch is a framing error and the
    /// caller drops the frame.
    pub fn parse(kind: MessageKind, text: &str) -> Result<Self> {
        let fields: Vec<&str> = text.split(UNIT_SEPARATOR).collect();
        match kind {
            MessageKind::RegistrationReq => {
                let [mac, name] = two_fields(kind, &fields)?;
                Ok(PeerMessage::RegistrationReq { mac, name })
            }
            MessageKind::Registration => {
                let [target, name] = two_fields(kind, &fields)?;
                Ok(PeerMessage::Registration { target, name })
            }
            MessageKind::RegistrationAck => {
                let [mac, name] = two_fields(kind, &fields)?;
                Ok(PeerMessage::RegistrationAck { mac, name })
            }
            MessageKind::Poll => Ok(PeerMessage::Poll),
            MessageKind::PollAck => {
                let [name, fingerprint] = two_fields(kind, &fields)?;
                Ok(PeerMessage::PollAck { name, fingerprint })
            }
            kind if kind.is_command() => {
                if fields.is_empty() || fields[0].is_empty() {
                    return Err(Error::framing(format!(
                        "{} payload missing origination id",
                        kind.validator()
                    )));
                }
                Ok(PeerMessage::Command {
                    kind,
                    origination_msg_id: fields[0].to_string(),
                    payload: fields[1..].join(&UNIT_SEPARATOR.to_string()),
                })
            }
            kind if kind.is_response() => {
                if fields.len() != 3 {
                    return Err(Error::framing(format!(
                        "{} payload has {} fields, expected 3",
                        kind.validator(),
                        fields.len()
                    )));
                }
                Ok(PeerMessage::Response {
                    kind,
                    origination_msg_id: fields[0].to_string(),
                    name: fields[1].to_string(),
                    message: fields[2].to_string(),
                })
            }
            _ => Err(Error::protocol(format!(
                "cannot parse payload for kind {:?}",
                kind
            ))),
        }
    }
}

fn two_fields(kind: MessageKind, fields: &[&str]) -> Result<[String; 2]> {
    if fields.len() != 2 {
        return Err(Error::framing(format!(
            "{} payload has {} fields, expected 2",
            kind.validator(),
            fields.len()
        )));
    }
    Ok([fields[0].to_string(), fields[1].to_string()])
}

/// Event handed to the upstream interface queue
///
/// Consumed by business logic outside this crate: script storage, config
/// application, HTTP responders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceEvent {
    /// What the peer reported
    pub kind: MessageKind,
    /// Textual id of the message that originated the exchange
    pub origination_msg_id: String,
    /// Address of the reporting peer
    pub peer: LinkAddress,
    /// Display name of the reporting peer, empty when not known
    pub peer_name: String,
    /// Free-form payload for the consumer
    pub message: String,
}
