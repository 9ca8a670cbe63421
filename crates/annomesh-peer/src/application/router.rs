//! RebroadcastRouter: turns the host's star of links into a logical mesh.
//!
//! Joiners only ever connect to the host.  When the host receives a message
//! from joiner P it applies the message locally and then forwards the same
//! message, with P's `peerId` untouched, to every other open link:
//!
//! ```text
//!        ┌──────► B
//!  A ──► Host
//!        └──────► C        (never back to A)
//! ```
//!
//! The router only decides *where* a message goes.  It works on a snapshot of
//! the open links taken before any send, so a link closing mid-relay cannot
//! disturb the iteration.

use annomesh_core::{MessageBody, PeerId};

use super::transport::LinkHandle;

#[derive(Debug, Default)]
pub struct RebroadcastRouter {
    relayed: u64,
}

impl RebroadcastRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Links `body` from `origin` must be forwarded to.
    ///
    /// Empty for host-directed or host-originated messages.
    pub fn targets(
        &mut self,
        snapshot: &[(PeerId, LinkHandle)],
        origin: &str,
        body: &MessageBody,
    ) -> Vec<(PeerId, LinkHandle)> {
        if !body.is_relayable() {
            return Vec::new();
        }
        let targets: Vec<_> = snapshot
            .iter()
            .filter(|(peer, _)| peer != origin)
            .cloned()
            .collect();
        self.relayed += targets.len() as u64;
        targets
    }

    /// Total number of frames the router has fanned out.
    pub fn relayed(&self) -> u64 {
        self.relayed
    }
}
