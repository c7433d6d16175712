//! Framing codec: newline-delimited JSON.
//!
//! Every message is one JSON object on one line, terminated by `\n`.
//! JSON strings escape raw newlines, so the delimiter never appears inside
//! a well-formed payload.

use bytes::{BufMut, BytesMut};

use crate::error::{ProtocolError, ProtocolResult};
use crate::message::Message;

/// Frames larger than this are rejected on both encode and decode.
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Encoder/decoder for newline-delimited JSON frames.
pub struct RpcCodec;

impl RpcCodec {
    /// Encode a message as one `\n`-terminated frame.
    pub fn encode(msg: &Message) -> ProtocolResult<Vec<u8>> {
        let payload =
            serde_json::to_vec(msg).map_err(|e| ProtocolError::Serialization(e.to_string()))?;
        if payload.len() > MAX_FRAME_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                size: payload.len(),
                max: MAX_FRAME_SIZE,
            });
        }
        let mut buf = Vec::with_capacity(payload.len() + 1);
        buf.extend_from_slice(&payload);
        buf.push(b'\n');
        Ok(buf)
    }

    /// Append a frame for `msg` to `buf`.
    pub fn encode_into(msg: &Message, buf: &mut BytesMut) -> ProtocolResult<()> {
        let frame = Self::encode(msg)?;
        buf.reserve(frame.len());
        buf.put_slice(&frame);
        Ok(())
    }

    /// Decode one line (without its trailing `\n`).
    pub fn decode_line(line: &str) -> ProtocolResult<Message> {
        if line.len() > MAX_FRAME_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                size: line.len(),
                max: MAX_FRAME_SIZE,
            });
        }
        if line.trim().is_empty() {
            return Err(ProtocolError::Framing("empty frame".into()));
        }
        serde_json::from_str(line).map_err(|e| ProtocolError::Deserialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Request, Response};
    use serde_json::json;

    #[test]
    fn encode_terminates_with_newline() {
        let msg = Message::Request(Request::call(1, "ping", None));
        let bytes = RpcCodec::encode(&msg).unwrap();
        assert_eq!(*bytes.last().unwrap(), b'\n');
        // Exactly one newline: the frame is a single line.
        assert_eq!(bytes.iter().filter(|b| **b == b'\n').count(), 1);
    }

    #[test]
    fn roundtrip_request() {
        let msg = Message::Request(Request::call(3, "repo/watch", Some(json!({"repo": "r"}))));
        let bytes = RpcCodec::encode(&msg).unwrap();
        let line = std::str::from_utf8(&bytes[..bytes.len() - 1]).unwrap();
        let decoded = RpcCodec::decode_line(line).unwrap();
        match decoded {
            Message::Request(req) => {
                assert_eq!(req.id, Some(3));
                assert_eq!(req.method, "repo/watch");
            }
            Message::Response(_) => panic!("expected request"),
        }
    }

    #[test]
    fn roundtrip_response() {
        let msg = Message::Response(Response::success(3, json!("pong")));
        let bytes = RpcCodec::encode(&msg).unwrap();
        let line = std::str::from_utf8(&bytes[..bytes.len() - 1]).unwrap();
        let decoded = RpcCodec::decode_line(line).unwrap();
        assert!(matches!(decoded, Message::Response(_)));
    }

    #[test]
    fn newlines_in_payload_stay_escaped() {
        let msg = Message::Request(Request::notification(
            "debug/log",
            Some(json!({"text": "line one\nline two"})),
        ));
        let bytes = RpcCodec::encode(&msg).unwrap();
        assert_eq!(bytes.iter().filter(|b| **b == b'\n').count(), 1);
    }

    #[test]
    fn decode_rejects_empty_line() {
        assert!(matches!(
            RpcCodec::decode_line(""),
            Err(ProtocolError::Framing(_))
        ));
        assert!(matches!(
            RpcCodec::decode_line("   "),
            Err(ProtocolError::Framing(_))
        ));
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(matches!(
            RpcCodec::decode_line("not json"),
            Err(ProtocolError::Deserialization(_))
        ));
    }

    #[test]
    fn encode_into_appends() {
        let mut buf = BytesMut::new();
        let a = Message::Request(Request::call(1, "ping", None));
        let b = Message::Request(Request::call(2, "ping", None));
        RpcCodec::encode_into(&a, &mut buf).unwrap();
        RpcCodec::encode_into(&b, &mut buf).unwrap();
        assert_eq!(buf.iter().filter(|c| **c == b'\n').count(), 2);
    }
}
