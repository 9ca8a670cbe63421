//! Protocol module containing the wire message union, the JSON codec, and
//! element id generation.

pub mod codec;
pub mod messages;
pub mod sequence;

pub use codec::{decode_message, encode_message, stamp_sender, ProtocolError};
pub use messages::*;
pub use sequence::{ElementIdGenerator, SequenceCounter};
