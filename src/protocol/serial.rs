//! Serial framing for the wired host <-> radio-node transport
//!
//! Mirrors the wire codec's validator discipline but over a textual,
//! delimiter-based format: `<ordinal>RS<validator>RS<msg_id>GS<payload...>`,
//! one message per line. Roster payloads join records with RS and fields
//! with US. None of the control delimiters are escaped, so payload text
//! must not contain them.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::core::{Error, MsgId, Peer, Result};
use super::message::MessageKind;
use super::{GROUP_SEPARATOR, RECORD_SEPARATOR, UNIT_SEPARATOR};

/// Validated header of a serial message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialHeader {
    /// Message kind from the ordinal token
    pub kind: MessageKind,
    /// Textual message id token
    pub msg_id: String,
}

/// Builds the header group for a serial message
pub fn generate_header(kind: MessageKind, msg_id: &MsgId) -> String {
    format!(
        "{}{}{}{}{}{}",
        kind as u8,
        RECORD_SEPARATOR,
        kind.validator(),
        RECORD_SEPARATOR,
        msg_id,
        GROUP_SEPARATOR
    )
}

/// Validates a raw serial message and extracts its header
///
/// The header group must split into exactly three tokens (ordinal,
/// validator, msg id); the ordinal must name a known kind and the validator
/// must byte-match it.
pub fn validate(raw: &str) -> Result<SerialHeader> {
    let header = raw.split(GROUP_SEPARATOR).next().unwrap_or("");

    let tokens: Vec<&str> = header.split(RECORD_SEPARATOR).collect();
    if tokens.len() != 3 {
        return Err(Error::framing(format!(
            "serial header has {} tokens, expected 3",
            tokens.len()
        )));
    }

    let ordinal: u8 = tokens[0]
        .parse()
        .map_err(|_| Error::framing(format!("serial type token is not a number: {}", tokens[0])))?;
    let kind = MessageKind::from_u8(ordinal);
    if kind == MessageKind::Unknown {
        return Err(Error::framing(format!("unknown serial message type {}", ordinal)));
    }
    if tokens[1] != kind.validator() {
        return Err(Error::framing(format!(
            "serial validator mismatch: got {}, expected {}",
            tokens[1],
            kind.validator()
        )));
    }

    Ok(SerialHeader {
        kind,
        msg_id: tokens[2].to_string(),
    })
}

/// Returns the payload portion of a serial message, if any
pub fn payload(raw: &str) -> Option<&str> {
    raw.split_once(GROUP_SEPARATOR).map(|(_, rest)| rest)
}

/// Builds a POLL_ACK message carrying name and fingerprint
pub fn poll_ack(msg_id: &MsgId, name: &str, fingerprint: &str) -> String {
    format!(
        "{}{}{}{}",
        generate_header(MessageKind::PollAck, msg_id),
        name,
        UNIT_SEPARATOR,
        fingerprint
    )
}

/// Builds a POLL_NAK message for a non-responding peer
pub fn poll_nak(msg_id: &MsgId, name: &str) -> String {
    format!("{}{}", generate_header(MessageKind::PollNak, msg_id), name)
}

/// Builds a generic ack/nak message: origination id, peer name, detail
pub fn basic_ack_nak(
    kind: MessageKind,
    msg_id: &MsgId,
    origination_msg_id: &str,
    name: &str,
    message: &str,
) -> String {
    format!(
        "{}{}{}{}{}{}",
        generate_header(kind, msg_id),
        origination_msg_id,
        UNIT_SEPARATOR,
        name,
        UNIT_SEPARATOR,
        message
    )
}

/// Builds a registration roster ack: one RS-joined record per cached peer
pub fn registration_sync_ack(msg_id: &MsgId, peers: &[Peer]) -> String {
    let mut out = generate_header(MessageKind::RegistrationAck, msg_id);
    for peer in peers {
        out.push_str(&peer.id.to_string());
        out.push(UNIT_SEPARATOR);
        out.push_str(&peer.name);
        out.push(UNIT_SEPARATOR);
        out.push_str(&peer.address.to_string());
        out.push(RECORD_SEPARATOR);
    }
    if out.ends_with(RECORD_SEPARATOR) {
        out.pop();
    }
    out
}

/// Line-delimited codec for the serial transport
///
/// One serial message per `\n`-terminated line over any byte stream.
#[derive(Debug, Clone, Default)]
pub struct SerialCodec;

impl SerialCodec {
    /// Creates a new serial codec
    pub fn new() -> Self {
        SerialCodec
    }
}

impl Decoder for SerialCodec {
    type Item = String;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        let newline = match src.iter().position(|b| *b == b'\n') {
            Some(pos) => pos,
            // Need more data to read a full line
            None => return Ok(None),
        };

        let mut line = src.split_to(newline);
        src.advance(1);
        if line.last() == Some(&b'\r') {
            line.truncate(line.len() - 1);
        }

        match String::from_utf8(line.to_vec()) {
            Ok(text) => Ok(Some(text)),
            Err(e) => Err(Error::framing(format!("serial line is not UTF-8: {}", e))),
        }
    }
}

impl Encoder<String> for SerialCodec {
    type Error = Error;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<()> {
        dst.reserve(item.len() + 1);
        dst.put_slice(item.as_bytes());
        dst.put_u8(b'\n');
        Ok(())
    }
}
