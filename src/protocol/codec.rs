use bytes::{BufMut, Bytes, BytesMut};

use crate::core::{Error, LinkAddress, MsgId, Result, FRAME_HEADER_SIZE, LINK_MTU};
use super::message::MessageKind;
use super::UNIT_SEPARATOR;

/// One wire-level unit of the protocol, part of a possibly multi-frame message
///
/// Immutable once decoded. For accepted frames `payload` excludes the
/// validator token and its separator; for `Unknown` frames it is left
/// untouched and must not be interpreted.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Opaque correlation token shared by all fragments of a message
    pub id: MsgId,
    /// 1-indexed position of this fragment
    pub packet_number: u8,
    /// Total fragments in the message
    pub total_packets: u8,
    /// Message kind, downgraded to Unknown on validator mismatch
    pub kind: MessageKind,
    /// Payload bytes
    pub payload: Bytes,
}

/// Splits messages into fixed-size link frames and parses them back
///
/// Every fragment re-embeds the full `validator + US` prefix, so the usable
/// body capacity per fragment shrinks with the type-name length. This is a
/// wire-compatibility requirement, not an accident.
#[derive(Debug, Clone, Copy, Default)]
pub struct PacketCodec;

impl PacketCodec {
    /// Usable body bytes per fragment for the given kind
    pub fn usable_payload(kind: MessageKind) -> usize {
        LINK_MTU - FRAME_HEADER_SIZE - kind.validator().len() - 1
    }

    /// Encodes a message into ordered frames under a fresh random id
    ///
    /// The logical content is `source [US body]`. An empty content still
    /// yields exactly one frame carrying only the validator prefix.
    pub fn encode(
        kind: MessageKind,
        source: Option<LinkAddress>,
        body: Option<&str>,
    ) -> Result<Vec<Bytes>> {
        Self::encode_with_id(MsgId::random(), kind, source, body)
    }

    /// Encodes a message into ordered frames under the given id
    pub fn encode_with_id(
        id: MsgId,
        kind: MessageKind,
        source: Option<LinkAddress>,
        body: Option<&str>,
    ) -> Result<Vec<Bytes>> {
        if kind == MessageKind::Unknown {
            return Err(Error::protocol("cannot encode a frame of kind Unknown"));
        }

        let mut content = String::new();
        if let Some(addr) = source {
            content.push_str(&addr.to_string());
        }
        if let Some(body) = body {
            if !content.is_empty() {
                content.push(UNIT_SEPARATOR);
            }
            content.push_str(body);
        }

        let validator = kind.validator().as_bytes();
        let usable = Self::usable_payload(kind);
        let content = content.as_bytes();
        let total = if content.is_empty() {
            1
        } else {
            (content.len() + usable - 1) / usable
        };
        if total > u8::MAX as usize {
            return Err(Error::framing(format!(
                "message of {} bytes needs {} fragments, limit is 255",
                content.len(),
                total
            )));
        }

        let mut frames = Vec::with_capacity(total);
        for n in 0..total {
            let start = n * usable;
            let end = usize::min(start + usable, content.len());
            let chunk = &content[start..end];
            let payload_size = validator.len() + 1 + chunk.len();
            // payload_size is bounded by LINK_MTU - FRAME_HEADER_SIZE, which
            // fits the u8 wire field; a violation here is a caller bug.
            debug_assert!(payload_size <= u8::MAX as usize);

            let mut buf = BytesMut::with_capacity(FRAME_HEADER_SIZE + payload_size);
            buf.put_slice(&id.0);
            buf.put_u8((n + 1) as u8);
            buf.put_u8(total as u8);
            buf.put_u8(kind as u8);
            buf.put_u8(payload_size as u8);
            buf.put_slice(validator);
            buf.put_u8(UNIT_SEPARATOR as u8);
            buf.put_slice(chunk);
            frames.push(buf.freeze());
        }

        Ok(frames)
    }

    /// Parses one received frame
    ///
    /// Short or truncated buffers are framing errors. An unrecognized type
    /// ordinal or a validator mismatch is not: the frame comes back with
    /// `kind == Unknown` and its payload unstripped, and the caller drops it.
    pub fn decode(bytes: &[u8]) -> Result<Frame> {
        if bytes.len() < FRAME_HEADER_SIZE {
            return Err(Error::framing(format!(
                "frame of {} bytes is shorter than the {}-byte header",
                bytes.len(),
                FRAME_HEADER_SIZE
            )));
        }

        let mut id = [0u8; 16];
        id.copy_from_slice(&bytes[..16]);
        let packet_number = bytes[16];
        let total_packets = bytes[17];
        let ordinal = bytes[18];
        let payload_size = bytes[19] as usize;

        if bytes.len() < FRAME_HEADER_SIZE + payload_size {
            return Err(Error::framing(format!(
                "frame payload truncated: header claims {} bytes, {} available",
                payload_size,
                bytes.len() - FRAME_HEADER_SIZE
            )));
        }
        if total_packets == 0 || packet_number == 0 || packet_number > total_packets {
            return Err(Error::framing(format!(
                "frame numbering out of range: packet {} of {}",
                packet_number, total_packets
            )));
        }

        let payload = Bytes::copy_from_slice(
            &bytes[FRAME_HEADER_SIZE..FRAME_HEADER_SIZE + payload_size],
        );
        let kind = MessageKind::from_u8(ordinal);

        let (kind, payload) = if kind == MessageKind::Unknown {
            (MessageKind::Unknown, payload)
        } else {
            let validator = kind.validator().as_bytes();
            let valid = payload.len() > validator.len()
                && &payload[..validator.len()] == validator
                && payload[validator.len()] == UNIT_SEPARATOR as u8;
            if valid {
                (kind, payload.slice(validator.len() + 1..))
            } else {
                (MessageKind::Unknown, payload)
            }
        };

        Ok(Frame {
            id: MsgId(id),
            packet_number,
            total_packets,
            kind,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::reassembly::{FragmentOutcome, ReassemblyTracker};

    fn addr() -> LinkAddress {
        LinkAddress([0xAA, 0xBB, 0xCC, 0x00, 0x11, 0x22])
    }

    fn reassemble(frames: &[Bytes]) -> (MessageKind, Vec<u8>) {
        let mut tracker = ReassemblyTracker::new(1000);
        let mut kind = MessageKind::Unknown;
        let mut id = None;
        for (i, raw) in frames.iter().enumerate() {
            let frame = PacketCodec::decode(raw).unwrap();
            kind = frame.kind;
            id = Some(frame.id);
            let outcome = tracker.add_fragment(
                frame.id,
                frame.packet_number,
                frame.total_packets,
                &frame.payload,
                i as u64,
            );
            if i + 1 == frames.len() {
                // a first fragment always reports Accepted, even when it is
                // the whole message; callers treat size == total as done
                let expected = if frames.len() == 1 {
                    FragmentOutcome::Accepted
                } else {
                    FragmentOutcome::Complete
                };
                assert_eq!(outcome, expected);
            }
        }
        (kind, tracker.get_message(id.unwrap()))
    }

    #[test]
    fn test_round_trip_across_body_lengths() {
        let usable = PacketCodec::usable_payload(MessageKind::ScriptDeploy);
        for len in [0usize, 1, usable - 18, usable, usable + 1, 600, 2000] {
            let body: String = "x".repeat(len);
            let frames =
                PacketCodec::encode(MessageKind::ScriptDeploy, Some(addr()), Some(&body)).unwrap();
            let (kind, payload) = reassemble(&frames);
            assert_eq!(kind, MessageKind::ScriptDeploy);
            let expected = format!("{}{}{}", addr(), super::UNIT_SEPARATOR, body);
            assert_eq!(payload, expected.as_bytes(), "body length {}", len);
        }
    }

    #[test]
    fn test_round_trip_source_only() {
        let frames = PacketCodec::encode(MessageKind::Poll, Some(addr()), None).unwrap();
        assert_eq!(frames.len(), 1);
        let frame = PacketCodec::decode(&frames[0]).unwrap();
        assert_eq!(frame.kind, MessageKind::Poll);
        assert_eq!(frame.payload, addr().to_string().as_bytes());
    }

    #[test]
    fn test_fragment_count_law() {
        let kind = MessageKind::Config;
        let usable = PacketCodec::usable_payload(kind);
        for len in [1usize, usable, usable + 1, 3 * usable, 3 * usable + 7] {
            let body = "y".repeat(len);
            let frames = PacketCodec::encode_with_id(
                MsgId::random(),
                kind,
                None,
                Some(&body),
            )
            .unwrap();
            let expected = (len + usable - 1) / usable;
            assert_eq!(frames.len(), expected.max(1));

            // only the last fragment may be short
            let last = PacketCodec::decode(frames.last().unwrap()).unwrap();
            let tail = if len % usable == 0 { usable } else { len % usable };
            assert_eq!(last.payload.len(), tail);
        }
    }

    #[test]
    fn test_empty_content_yields_one_frame() {
        let kind = MessageKind::Poll;
        let frames = PacketCodec::encode(kind, None, None).unwrap();
        assert_eq!(frames.len(), 1);
        // payload_size field covers exactly validator + separator
        assert_eq!(
            frames[0][19] as usize,
            kind.validator().len() + 1
        );
        let frame = PacketCodec::decode(&frames[0]).unwrap();
        assert_eq!(frame.kind, kind);
        assert!(frame.payload.is_empty());
    }

    #[test]
    fn test_validator_corruption_downgrades_to_unknown() {
        let frames =
            PacketCodec::encode(MessageKind::RegistrationAck, Some(addr()), Some("arm")).unwrap();
        let mut raw = frames[0].to_vec();
        raw[FRAME_HEADER_SIZE] ^= 0xFF; // first byte of the embedded validator
        let frame = PacketCodec::decode(&raw).unwrap();
        assert_eq!(frame.kind, MessageKind::Unknown);
        // payload stays unstripped so nothing downstream interprets it
        assert_eq!(frame.payload.len(), raw[19] as usize);
    }

    #[test]
    fn test_unknown_ordinal_downgrades_to_unknown() {
        let frames = PacketCodec::encode(MessageKind::Poll, Some(addr()), None).unwrap();
        let mut raw = frames[0].to_vec();
        raw[18] = 77;
        let frame = PacketCodec::decode(&raw).unwrap();
        assert_eq!(frame.kind, MessageKind::Unknown);
    }

    #[test]
    fn test_decode_rejects_short_and_truncated() {
        assert!(PacketCodec::decode(&[0u8; 10]).is_err());

        let frames = PacketCodec::encode(MessageKind::Poll, Some(addr()), None).unwrap();
        let raw = &frames[0][..frames[0].len() - 3];
        assert!(PacketCodec::decode(raw).is_err());
    }

    #[test]
    fn test_decode_rejects_bad_numbering() {
        let frames = PacketCodec::encode(MessageKind::Poll, Some(addr()), None).unwrap();
        let mut raw = frames[0].to_vec();
        raw[16] = 2; // packet 2 of 1
        assert!(PacketCodec::decode(&raw).is_err());
        raw[16] = 0;
        assert!(PacketCodec::decode(&raw).is_err());
    }

    #[test]
    fn test_encode_rejects_oversized_message() {
        let usable = PacketCodec::usable_payload(MessageKind::ScriptDeploy);
        let body = "z".repeat(usable * 256);
        assert!(PacketCodec::encode(MessageKind::ScriptDeploy, None, Some(&body)).is_err());
    }

    #[test]
    fn test_encode_rejects_unknown_kind() {
        assert!(PacketCodec::encode(MessageKind::Unknown, None, None).is_err());
    }

    #[test]
    fn test_frames_share_id_and_numbering() {
        let usable = PacketCodec::usable_payload(MessageKind::ScriptRun);
        let body = "s".repeat(usable * 2 + 5);
        let frames = PacketCodec::encode(MessageKind::ScriptRun, None, Some(&body)).unwrap();
        assert_eq!(frames.len(), 3);
        let first = PacketCodec::decode(&frames[0]).unwrap();
        for (i, raw) in frames.iter().enumerate() {
            let frame = PacketCodec::decode(raw).unwrap();
            assert_eq!(frame.id, first.id);
            assert_eq!(frame.packet_number, (i + 1) as u8);
            assert_eq!(frame.total_packets, 3);
        }
    }
}
