//! SysEx message codec
//!
//! Frame layout: `F0 7F 01 <kind> <from_host> <payload…> F7`.
//!
//! The payload is the JSON body of the message, 7-bit packed so it is legal
//! inside a SysEx frame: every group of up to 7 bytes is preceded by one byte
//! holding their high bits.

use bytes::{BufMut, Bytes, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use super::{ControllerMessage, HostMessage, MessageKind};

pub const SYSEX_START: u8 = 0xF0;
pub const SYSEX_END: u8 = 0xF7;
/// Non-commercial manufacturer id
pub const MANUFACTURER_ID: u8 = 0x7F;
pub const PROTOCOL_VERSION: u8 = 0x01;

/// Start, manufacturer, version, kind, origin, end
pub const MIN_FRAME_LEN: usize = 6;
pub const MAX_FRAME_LEN: usize = 4096;

const HEADER_LEN: usize = 5;

/// Why a frame could not be turned into a message
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("frame too short ({0} bytes)")]
    Truncated(usize),

    #[error("frame too long ({0} bytes, max {max})", max = MAX_FRAME_LEN)]
    TooLong(usize),

    #[error("bad framing: {0}")]
    Framing(&'static str),

    #[error("unknown message kind 0x{0:02X}")]
    UnknownKind(u8),

    #[error("{kind} not expected from {origin}")]
    UnexpectedKind {
        kind: MessageKind,
        origin: &'static str,
    },

    #[error("payload byte 0x{0:02X} is not 7-bit")]
    NotSevenBit(u8),

    #[error("payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Typed messages ↔ frames for one side of the link
pub trait MessageCodec {
    type Outbound;
    type Inbound;

    fn encode(&self, message: &Self::Outbound) -> Result<Bytes, CodecError>;

    fn decode(&self, frame: &[u8]) -> Result<Self::Inbound, CodecError>;
}

/// SysEx codec for the controller side
#[derive(Debug, Clone, Copy, Default)]
pub struct SysExCodec;

/// SysEx codec for the host side (used by the simulated host)
#[derive(Debug, Clone, Copy, Default)]
pub struct HostSysExCodec;

impl MessageCodec for SysExCodec {
    type Outbound = ControllerMessage;
    type Inbound = HostMessage;

    fn encode(&self, message: &ControllerMessage) -> Result<Bytes, CodecError> {
        encode_frame(message, message.kind(), false)
    }

    fn decode(&self, frame: &[u8]) -> Result<HostMessage, CodecError> {
        let (kind, from_host, payload) = split_frame(frame)?;
        if !from_host || !kind.sent_by_host() {
            return Err(CodecError::UnexpectedKind {
                kind,
                origin: if from_host { "host" } else { "controller" },
            });
        }
        decode_payload(kind, payload)
    }
}

impl MessageCodec for HostSysExCodec {
    type Outbound = HostMessage;
    type Inbound = ControllerMessage;

    fn encode(&self, message: &HostMessage) -> Result<Bytes, CodecError> {
        encode_frame(message, message.kind(), true)
    }

    fn decode(&self, frame: &[u8]) -> Result<ControllerMessage, CodecError> {
        let (kind, from_host, payload) = split_frame(frame)?;
        if from_host || !kind.sent_by_controller() {
            return Err(CodecError::UnexpectedKind {
                kind,
                origin: if from_host { "host" } else { "controller" },
            });
        }
        decode_payload(kind, payload)
    }
}

fn encode_frame<M: Serialize>(
    message: &M,
    kind: MessageKind,
    from_host: bool,
) -> Result<Bytes, CodecError> {
    // Externally tagged: unit variants are a bare string, others a
    // single-key object whose value is the body
    let body = match serde_json::to_value(message)? {
        Value::Object(mut map) => match map.remove(kind.name()) {
            Some(inner) => serde_json::to_vec(&inner)?,
            None => return Err(CodecError::Framing("message tag does not match kind")),
        },
        _ => Vec::new(),
    };

    let packed = pack_7bit(&body);
    let len = HEADER_LEN + packed.len() + 1;
    if len > MAX_FRAME_LEN {
        return Err(CodecError::TooLong(len));
    }

    let mut buf = BytesMut::with_capacity(len);
    buf.put_u8(SYSEX_START);
    buf.put_u8(MANUFACTURER_ID);
    buf.put_u8(PROTOCOL_VERSION);
    buf.put_u8(kind.id());
    buf.put_u8(u8::from(from_host));
    buf.extend_from_slice(&packed);
    buf.put_u8(SYSEX_END);
    Ok(buf.freeze())
}

/// Validate framing; returns kind, origin flag and the packed payload
fn split_frame(frame: &[u8]) -> Result<(MessageKind, bool, &[u8]), CodecError> {
    if frame.len() < MIN_FRAME_LEN {
        return Err(CodecError::Truncated(frame.len()));
    }
    if frame.len() > MAX_FRAME_LEN {
        return Err(CodecError::TooLong(frame.len()));
    }
    if frame[0] != SYSEX_START || frame[frame.len() - 1] != SYSEX_END {
        return Err(CodecError::Framing("missing SysEx start/end"));
    }
    if frame[1] != MANUFACTURER_ID {
        return Err(CodecError::Framing("foreign manufacturer id"));
    }
    if frame[2] != PROTOCOL_VERSION {
        return Err(CodecError::Framing("unsupported protocol version"));
    }

    let kind = MessageKind::from_id(frame[3]).ok_or(CodecError::UnknownKind(frame[3]))?;
    let from_host = match frame[4] {
        0 => false,
        1 => true,
        _ => return Err(CodecError::Framing("origin flag must be 0 or 1")),
    };

    Ok((kind, from_host, &frame[HEADER_LEN..frame.len() - 1]))
}

fn decode_payload<M: DeserializeOwned>(kind: MessageKind, packed: &[u8]) -> Result<M, CodecError> {
    let body = unpack_7bit(packed)?;
    let tagged = if body.is_empty() {
        Value::String(kind.name().to_string())
    } else {
        let inner: Value = serde_json::from_slice(&body)?;
        let mut map = serde_json::Map::with_capacity(1);
        map.insert(kind.name().to_string(), inner);
        Value::Object(map)
    };
    Ok(serde_json::from_value(tagged)?)
}

/// Spread 8-bit data over 7-bit bytes
pub fn pack_7bit(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + data.len() / 7 + 1);
    for chunk in data.chunks(7) {
        let mut high_bits = 0u8;
        for (i, byte) in chunk.iter().enumerate() {
            if byte & 0x80 != 0 {
                high_bits |= 1 << i;
            }
        }
        out.push(high_bits);
        out.extend(chunk.iter().map(|b| b & 0x7F));
    }
    out
}

/// Inverse of [`pack_7bit`]
pub fn unpack_7bit(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::with_capacity(data.len());
    for chunk in data.chunks(8) {
        if let Some(&bad) = chunk.iter().find(|b| **b & 0x80 != 0) {
            return Err(CodecError::NotSevenBit(bad));
        }
        let high_bits = chunk[0];
        for (i, byte) in chunk[1..].iter().enumerate() {
            out.push(byte | (((high_bits >> i) & 1) << 7));
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ListWindow, ParameterValueChange, WireItem};
    use crate::state::ListKind;
    use crate::view::ViewId;

    #[test]
    fn test_frame_header_layout() {
        let frame = SysExCodec
            .encode(&ControllerMessage::RequestHostStatus)
            .unwrap();
        assert_eq!(&frame[..], &[0xF0, 0x7F, 0x01, 0x03, 0x00, 0xF7]);
    }

    #[test]
    fn test_controller_message_reaches_host() {
        let message = ControllerMessage::ViewStateChanged {
            view: ViewId::Mix,
            overlay_active: true,
        };
        let frame = SysExCodec.encode(&message).unwrap();
        assert_eq!(frame[3], MessageKind::ViewStateChanged.id());
        assert_eq!(frame[4], 0);
        assert!(frame[1..frame.len() - 1].iter().all(|b| *b < 0x80));

        let decoded = HostSysExCodec.decode(&frame).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn test_host_window_with_utf8_names() {
        let window = HostMessage::ListWindow(ListWindow {
            kind: ListKind::Tracks,
            start_index: 0,
            items: vec![WireItem::named("Bässe"), WireItem::named("Drums ♪")],
            total_count: 2,
            is_nested: false,
            current_index: 1,
        });
        let frame = HostSysExCodec.encode(&window).unwrap();
        assert!(frame[1..frame.len() - 1].iter().all(|b| *b < 0x80));
        assert_eq!(SysExCodec.decode(&frame).unwrap(), window);
    }

    #[test]
    fn test_unit_host_message_has_empty_payload() {
        let frame = HostSysExCodec.encode(&HostMessage::HostDeactivated).unwrap();
        assert_eq!(frame.len(), MIN_FRAME_LEN);
        assert_eq!(SysExCodec.decode(&frame).unwrap(), HostMessage::HostDeactivated);
    }

    #[test]
    fn test_wrong_origin_rejected() {
        // Controller-originated value change fed back into the controller
        let frame = SysExCodec
            .encode(&ControllerMessage::ParameterValueChange {
                index: 0,
                value: 0.5,
                is_echo: false,
            })
            .unwrap();
        assert!(matches!(
            SysExCodec.decode(&frame),
            Err(CodecError::UnexpectedKind { .. })
        ));

        let host = HostSysExCodec
            .encode(&HostMessage::ParameterValueChange(ParameterValueChange {
                index: 0,
                value: 0.5,
                display_value: "50 %".into(),
                is_echo: true,
            }))
            .unwrap();
        assert!(SysExCodec.decode(&host).is_ok());
    }

    #[test]
    fn test_malformed_frames_rejected() {
        assert!(matches!(
            SysExCodec.decode(&[0xF0, 0x7F, 0xF7]),
            Err(CodecError::Truncated(3))
        ));
        assert!(matches!(
            SysExCodec.decode(&[0xF0, 0x7F, 0x01, 0x7E, 0x01, 0xF7]),
            Err(CodecError::UnknownKind(0x7E))
        ));
        assert!(matches!(
            SysExCodec.decode(&[0xF0, 0x00, 0x01, 0x02, 0x01, 0xF7]),
            Err(CodecError::Framing(_))
        ));
        assert!(matches!(
            SysExCodec.decode(&[0x90, 0x7F, 0x01, 0x02, 0x01, 0xF7]),
            Err(CodecError::Framing(_))
        ));
        // Payload that is not JSON
        assert!(matches!(
            SysExCodec.decode(&[0xF0, 0x7F, 0x01, 0x10, 0x01, 0x00, 0x7B, 0xF7]),
            Err(CodecError::Payload(_))
        ));
    }

    #[test]
    fn test_pack_7bit_high_bits() {
        let data = [0x00, 0xFF, 0x80, 0x7F, 0x01, 0x02, 0x03, 0x84];
        let packed = pack_7bit(&data);
        assert_eq!(packed.len(), 10);
        assert_eq!(packed[0], 0b0000_0110);
        assert_eq!(packed[8], 0b0000_0001);
        assert_eq!(unpack_7bit(&packed).unwrap(), data);
        assert!(matches!(unpack_7bit(&[0x80, 0x01]), Err(CodecError::NotSevenBit(0x80))));
    }
}
