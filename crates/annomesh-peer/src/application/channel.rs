//! MessageChannel: typed send and broadcast over open links.
//!
//! The channel is the only place messages are turned into text frames.  It
//! stamps the local peer id onto messages that do not carry a sender yet,
//! so relayed messages keep their original `peerId`.

use annomesh_core::protocol::{encode_message, stamp_sender, ProtocolError, WireMessage};
use annomesh_core::PeerId;
use thiserror::Error;
use tracing::{trace, warn};

use super::transport::{LinkHandle, Transport, TransportError};

#[derive(Debug, Error, PartialEq)]
pub enum ChannelError {
    #[error("no open link to peer {0}")]
    NoLink(PeerId),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Borrowed view over a transport for one batch of sends.
pub struct MessageChannel<'a, T: Transport + ?Sized> {
    transport: &'a mut T,
    local_peer: &'a str,
}

impl<'a, T: Transport + ?Sized> MessageChannel<'a, T> {
    pub fn new(transport: &'a mut T, local_peer: &'a str) -> Self {
        Self {
            transport,
            local_peer,
        }
    }

    /// Sends `msg` on one link.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError`] if encoding fails or the transport rejects
    /// the frame (e.g. the link closed in the meantime).
    pub fn send_to_peer(&mut self, link: LinkHandle, msg: WireMessage) -> Result<(), ChannelError> {
        let msg = stamp_sender(msg, self.local_peer);
        let frame = encode_message(&msg)?;
        self.transport.send(link, &frame)?;
        trace!(%link, kind = msg.body.type_name(), "sent");
        Ok(())
    }

    /// Sends `msg` on every link in `links`, encoding it once.
    ///
    /// Per-link failures are logged and skipped.  Returns the number of links
    /// the frame was handed to.
    pub fn send_to_all(&mut self, links: &[(PeerId, LinkHandle)], msg: WireMessage) -> usize {
        let msg = stamp_sender(msg, self.local_peer);
        let frame = match encode_message(&msg) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, kind = msg.body.type_name(), "could not encode broadcast");
                return 0;
            }
        };
        let mut delivered = 0;
        for (peer, link) in links {
            match self.transport.send(*link, &frame) {
                Ok(()) => delivered += 1,
                Err(e) => warn!(peer = %peer, %link, error = %e, "send failed"),
            }
        }
        trace!(kind = msg.body.type_name(), delivered, "broadcast");
        delivered
    }
}
