//! # annomesh-core
//!
//! Shared library for annomesh containing the wire protocol, the annotation
//! element model, and the coordinate normalizer.
//!
//! It has no dependencies on transports, clocks, or UI frameworks; both the
//! peer engine and any future front end build on it.
//!
//! # Architecture overview (for beginners)
//!
//! annomesh lets several people draw on one shared canvas at the same time.
//! One participant hosts a session and publishes a short share code; everyone
//! else joins by typing that code.  Every stroke, shape, sticker, or text box
//! a participant creates is an *annotation element*, and every change to an
//! element travels to the other participants as a small JSON message.
//!
//! This crate defines the vocabulary those participants share:
//!
//! - **`domain`** – Pure data and rules: elements and their geometry, the
//!   local undo/redo history, selections, share codes, and the mapping
//!   between pixel coordinates and resolution-independent unit coordinates.
//!
//! - **`protocol`** – How messages look on the wire: a closed, tagged union
//!   of message bodies, the JSON codec that turns them into text frames, and
//!   the generator for globally unique element ids.

pub mod domain;
pub mod protocol;

pub use domain::coords::{denormalize, normalize, CanvasSpace, CoordinateError, Frame, Point};
pub use domain::element::{AnnotationElement, ElementId, ElementPatch, Style, Tool};
pub use domain::history::History;
pub use domain::selection::SelectionSet;
pub use domain::share_code::{ShareCode, ShareCodeError};
pub use protocol::codec::{decode_message, encode_message, ProtocolError};
pub use protocol::messages::{MediaKind, MessageBody, PeerId, WireMessage};
