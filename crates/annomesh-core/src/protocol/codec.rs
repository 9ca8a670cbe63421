//! JSON codec for annomesh wire messages.
//!
//! Each transport frame carries exactly one UTF-8 JSON object.  Decoding
//! distinguishes three failure shapes so the receiver can log something
//! useful before dropping the frame:
//!
//! - the frame is not JSON, or a known message has bad fields → `MalformedPayload`
//! - the object has no string `type` → `MissingType`
//! - the `type` is not one this build understands → `UnknownMessageType`

use thiserror::Error;
use tracing::trace;

use crate::protocol::messages::{PeerId, WireMessage};

/// Upper bound on a single frame.  Full syncs of large canvases are the
/// biggest messages on the wire.
pub const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

/// Every `type` value [`decode_message`] accepts.
pub const KNOWN_MESSAGE_TYPES: &[&str] = &[
    "ANNOTATION_START",
    "ANNOTATION_MOVE",
    "ANNOTATION_END",
    "ANNOTATION_ELEMENT",
    "ELEMENT_UPDATE",
    "ELEMENT_DELETE",
    "ANNOTATION_CLEAR",
    "ANNOTATION_SYNC",
    "SYNC_REQUEST",
    "GROUP_CREATE",
    "GROUP_UNGROUP",
    "POINTER_MOVE",
    "CHAT_MESSAGE",
    "CHAT_REACTION",
    "PEER_JOINED",
    "PEER_LEFT",
    "MEDIA_STATE",
];

/// Errors that can occur during message encoding or decoding.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    #[error("frame of {size} bytes exceeds the {max} byte limit")]
    FrameTooLarge { size: usize, max: usize },

    #[error("message has no \"type\" field")]
    MissingType,

    #[error("unknown message type: {0}")]
    UnknownMessageType(String),

    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes a [`WireMessage`] into a JSON text frame.
///
/// # Errors
///
/// Returns [`ProtocolError::FrameTooLarge`] if the encoded frame would exceed
/// [`MAX_FRAME_BYTES`].
///
/// # Examples
///
/// ```rust
/// use annomesh_core::protocol::{decode_message, encode_message, MessageBody, WireMessage};
///
/// let msg = WireMessage::new("K7M2P", MessageBody::AnnotationEnd { id: "e1".into() });
/// let frame = encode_message(&msg).unwrap();
/// assert_eq!(decode_message(&frame).unwrap(), msg);
/// ```
pub fn encode_message(msg: &WireMessage) -> Result<String, ProtocolError> {
    let frame =
        serde_json::to_string(msg).map_err(|e| ProtocolError::MalformedPayload(e.to_string()))?;
    if frame.len() > MAX_FRAME_BYTES {
        return Err(ProtocolError::FrameTooLarge {
            size: frame.len(),
            max: MAX_FRAME_BYTES,
        });
    }
    Ok(frame)
}

/// Decodes one [`WireMessage`] from a text frame.
///
/// # Errors
///
/// Returns [`ProtocolError`] describing why the frame was rejected.
pub fn decode_message(frame: &str) -> Result<WireMessage, ProtocolError> {
    if frame.len() > MAX_FRAME_BYTES {
        return Err(ProtocolError::FrameTooLarge {
            size: frame.len(),
            max: MAX_FRAME_BYTES,
        });
    }
    let value: serde_json::Value =
        serde_json::from_str(frame).map_err(|e| ProtocolError::MalformedPayload(e.to_string()))?;
    let type_name = value
        .get("type")
        .and_then(serde_json::Value::as_str)
        .ok_or(ProtocolError::MissingType)?;
    if !KNOWN_MESSAGE_TYPES.contains(&type_name) {
        trace!(type_name, "unknown message type");
        return Err(ProtocolError::UnknownMessageType(type_name.to_string()));
    }
    serde_json::from_value(value).map_err(|e| ProtocolError::MalformedPayload(e.to_string()))
}

/// Fills in `peer_id` when the message does not carry one yet.
pub fn stamp_sender(mut msg: WireMessage, sender: &str) -> WireMessage {
    if msg.peer_id.is_none() {
        msg.peer_id = Some(PeerId::from(sender));
    }
    msg
}
