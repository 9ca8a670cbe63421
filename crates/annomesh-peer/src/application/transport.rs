//! The transport seam: what the engine needs from a peer-to-peer network.
//!
//! The engine never blocks on the network.  Every [`Transport`] method
//! returns immediately; anything that completes later (an endpoint becoming
//! ready, a link opening, data arriving, a link failing) comes back as a
//! [`TransportEvent`] that the driver feeds into
//! [`SessionController::handle_transport_event`](crate::application::session::SessionController::handle_transport_event).
//!
//! Infrastructure implementations wrap a real data-channel stack; the
//! in-memory network in `infrastructure::memory` implements it for tests and
//! simulations.

use std::fmt;

use annomesh_core::{MediaKind, PeerId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Handle of one reliable, ordered data link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkHandle(pub u64);

impl fmt::Display for LinkHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "link#{}", self.0)
    }
}

/// Handle of one media call (screen share or camera).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallHandle(pub u64);

impl fmt::Display for CallHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "call#{}", self.0)
    }
}

/// ICE negotiation progress of a link that has not opened yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    New,
    Checking,
    Connected,
    Completed,
    Failed,
    Disconnected,
    Closed,
}

impl NegotiationState {
    /// Whether negotiation is actively moving toward an open link.
    pub fn is_progressing(self) -> bool {
        matches!(
            self,
            NegotiationState::Checking | NegotiationState::Connected | NegotiationState::Completed
        )
    }
}

/// Why a link failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkFailure {
    /// Nobody is listening at the remote address.
    PeerUnavailable,
    IceFailed,
    IceDisconnected,
    Other(String),
}

/// A STUN or TURN server handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServer {
    pub urls: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("no local endpoint is open")]
    NoEndpoint,
    #[error("endpoint unavailable: {0}")]
    EndpointUnavailable(String),
    #[error("{0} is closed")]
    LinkClosed(LinkHandle),
    #[error("{0} is not known to this endpoint")]
    UnknownLink(LinkHandle),
    #[error("{0} is not known to this endpoint")]
    UnknownCall(CallHandle),
}

/// Completion and notification events produced by a [`Transport`].
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The local endpoint is registered under `address`.
    EndpointReady { address: PeerId },
    /// The local endpoint could not be registered.
    EndpointFailed { reason: String },
    /// A remote peer opened a link toward us.
    InboundLink { link: LinkHandle, remote: PeerId },
    LinkOpen { link: LinkHandle },
    LinkData { link: LinkHandle, payload: String },
    LinkClosed { link: LinkHandle },
    LinkError { link: LinkHandle, failure: LinkFailure },
    IncomingCall {
        call: CallHandle,
        remote: PeerId,
        kind: MediaKind,
    },
    /// Media is flowing on an answered call.
    CallStream { call: CallHandle },
    CallClosed { call: CallHandle },
}

/// Non-blocking peer-to-peer transport.
#[cfg_attr(test, mockall::automock)]
pub trait Transport: Send {
    /// Registers the local endpoint under `address`.  Completes with
    /// `EndpointReady` or `EndpointFailed`.
    fn open_endpoint(&mut self, address: &str, ice_servers: &[IceServer])
        -> Result<(), TransportError>;

    /// Tears down the endpoint and every link and call it owns.
    fn destroy_endpoint(&mut self);

    /// Starts opening a link.  Completes with `LinkOpen`, `LinkError`, or
    /// `LinkClosed` for the returned handle.
    fn connect(&mut self, remote: &str) -> Result<LinkHandle, TransportError>;

    fn send(&mut self, link: LinkHandle, payload: &str) -> Result<(), TransportError>;

    /// Closes a link.  Closing an already-closed link is a no-op.
    fn close_link(&mut self, link: LinkHandle);

    fn negotiation_state(&self, link: LinkHandle) -> NegotiationState;

    fn call(&mut self, remote: &str, kind: MediaKind) -> Result<CallHandle, TransportError>;

    fn answer(&mut self, call: CallHandle) -> Result<(), TransportError>;

    fn hang_up(&mut self, call: CallHandle);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_checking_connected_completed_are_progressing() {
        let progressing: Vec<_> = [
            NegotiationState::New,
            NegotiationState::Checking,
            NegotiationState::Connected,
            NegotiationState::Completed,
            NegotiationState::Failed,
            NegotiationState::Disconnected,
            NegotiationState::Closed,
        ]
        .into_iter()
        .filter(|s| s.is_progressing())
        .collect();
        assert_eq!(
            progressing,
            vec![
                NegotiationState::Checking,
                NegotiationState::Connected,
                NegotiationState::Completed
            ]
        );
    }

    #[test]
    fn test_handles_display_with_kind_prefix() {
        assert_eq!(LinkHandle(4).to_string(), "link#4");
        assert_eq!(CallHandle(9).to_string(), "call#9");
    }
}
