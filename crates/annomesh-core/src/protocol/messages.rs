//! All annomesh wire message types.
//!
//! Every message is a JSON object with a `type` discriminator and the
//! sender's `peerId`:
//!
//! ```json
//! {"peerId":"K7M2P","type":"ANNOTATION_MOVE","id":"K7M2P-1700000000000-3","tool":"pencil","x":0.52,"y":0.31}
//! ```
//!
//! Coordinates inside messages are always normalized (see
//! [`crate::domain::coords`]).  Unknown `type` values fail to decode; the
//! receiver logs and drops them.

use serde::{Deserialize, Serialize};

use crate::domain::element::{AnnotationElement, ElementId, ElementPatch, Tool};

/// Transport-level identity of a participant.  The host's id is its share code.
pub type PeerId = String;

// ── Envelope ──────────────────────────────────────────────────────────────────

/// A message plus the id of the peer that originated it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    #[serde(rename = "peerId", default, skip_serializing_if = "Option::is_none")]
    pub peer_id: Option<PeerId>,
    #[serde(flatten)]
    pub body: MessageBody,
}

impl WireMessage {
    pub fn new(peer_id: impl Into<PeerId>, body: MessageBody) -> Self {
        Self {
            peer_id: Some(peer_id.into()),
            body,
        }
    }

    /// A message without sender identity, as produced by old peers.
    pub fn anonymous(body: MessageBody) -> Self {
        Self {
            peer_id: None,
            body,
        }
    }
}

// ── Media ─────────────────────────────────────────────────────────────────────

/// Kind of real-time media stream carried by a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Screen,
    Camera,
}

// ── Chat ──────────────────────────────────────────────────────────────────────

/// An attachment shared through chat, inlined as base64.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatFile {
    pub name: String,
    pub mime_type: String,
    pub size: u64,
    pub data: String,
}

// ── Message bodies ────────────────────────────────────────────────────────────

/// The closed set of application messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum MessageBody {
    /// Begin a new element at a normalized point.
    AnnotationStart {
        id: ElementId,
        tool: Tool,
        color: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fill_color: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        filled: Option<bool>,
        width: f64,
        x: f64,
        y: f64,
    },
    /// Append a point (freehand) or move the end (shapes).
    AnnotationMove { id: ElementId, tool: Tool, x: f64, y: f64 },
    AnnotationEnd { id: ElementId },
    /// A complete element in one message (text, sticker, redo).
    AnnotationElement { element: AnnotationElement },
    ElementUpdate { id: ElementId, element: ElementPatch },
    ElementDelete { id: ElementId },
    AnnotationClear,
    /// Full state push from the host.  `history_step` counts the leading
    /// elements authored by the host itself.
    AnnotationSync {
        elements: Vec<AnnotationElement>,
        history_step: usize,
    },
    /// Ask the host to resend full state.
    SyncRequest,
    GroupCreate {
        group_id: ElementId,
        element_ids: Vec<ElementId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        children: Option<Vec<AnnotationElement>>,
    },
    GroupUngroup {
        group_id: ElementId,
        element_ids: Vec<ElementId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        children: Option<Vec<AnnotationElement>>,
    },
    PointerMove { nx: f64, ny: f64 },
    ChatMessage {
        message_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file: Option<ChatFile>,
    },
    ChatReaction { message_id: String, emoji: String },
    /// Host notice: a participant connected.
    PeerJoined { participant: PeerId },
    /// Host notice: a participant disconnected.
    PeerLeft { participant: PeerId },
    /// A participant started or stopped sharing a media stream.
    MediaState { kind: MediaKind, active: bool },
}

impl MessageBody {
    /// The wire `type` string, for logging.
    pub fn type_name(&self) -> &'static str {
        match self {
            MessageBody::AnnotationStart { .. } => "ANNOTATION_START",
            MessageBody::AnnotationMove { .. } => "ANNOTATION_MOVE",
            MessageBody::AnnotationEnd { .. } => "ANNOTATION_END",
            MessageBody::AnnotationElement { .. } => "ANNOTATION_ELEMENT",
            MessageBody::ElementUpdate { .. } => "ELEMENT_UPDATE",
            MessageBody::ElementDelete { .. } => "ELEMENT_DELETE",
            MessageBody::AnnotationClear => "ANNOTATION_CLEAR",
            MessageBody::AnnotationSync { .. } => "ANNOTATION_SYNC",
            MessageBody::SyncRequest => "SYNC_REQUEST",
            MessageBody::GroupCreate { .. } => "GROUP_CREATE",
            MessageBody::GroupUngroup { .. } => "GROUP_UNGROUP",
            MessageBody::PointerMove { .. } => "POINTER_MOVE",
            MessageBody::ChatMessage { .. } => "CHAT_MESSAGE",
            MessageBody::ChatReaction { .. } => "CHAT_REACTION",
            MessageBody::PeerJoined { .. } => "PEER_JOINED",
            MessageBody::PeerLeft { .. } => "PEER_LEFT",
            MessageBody::MediaState { .. } => "MEDIA_STATE",
        }
    }

    /// Whether the host forwards this message to the other joiners.
    ///
    /// Host-directed requests and host-originated control messages stay on
    /// the link they arrived on.
    pub fn is_relayable(&self) -> bool {
        !matches!(
            self,
            MessageBody::SyncRequest
                | MessageBody::AnnotationSync { .. }
                | MessageBody::PeerJoined { .. }
                | MessageBody::PeerLeft { .. }
        )
    }

    /// Whether the message changes the shared annotation state.
    pub fn is_annotation(&self) -> bool {
        matches!(
            self,
            MessageBody::AnnotationStart { .. }
                | MessageBody::AnnotationMove { .. }
                | MessageBody::AnnotationEnd { .. }
                | MessageBody::AnnotationElement { .. }
                | MessageBody::ElementUpdate { .. }
                | MessageBody::ElementDelete { .. }
                | MessageBody::AnnotationClear
                | MessageBody::AnnotationSync { .. }
                | MessageBody::GroupCreate { .. }
                | MessageBody::GroupUngroup { .. }
        )
    }
}
