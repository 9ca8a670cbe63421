//! Session-level errors and the alert strings shown to users.

use std::fmt;

use annomesh_core::{PeerId, ShareCodeError};
use thiserror::Error;

use super::events::SessionState;
use super::transport::LinkFailure;

/// Why a single connection attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCause {
    /// No `open` within the connect timeout.
    Timeout,
    /// ICE failed or disconnected.
    Network,
    /// Nobody is listening under the share code.
    PeerUnavailable,
    /// The remote closed the link before it opened.
    Closed,
    /// The transport refused to start the attempt.
    Transport,
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            FailureCause::Timeout => "timed out",
            FailureCause::Network => "network negotiation failed",
            FailureCause::PeerUnavailable => "peer unavailable",
            FailureCause::Closed => "closed before opening",
            FailureCause::Transport => "transport error",
        };
        f.write_str(text)
    }
}

impl From<&LinkFailure> for FailureCause {
    fn from(failure: &LinkFailure) -> Self {
        match failure {
            LinkFailure::PeerUnavailable => FailureCause::PeerUnavailable,
            LinkFailure::IceFailed | LinkFailure::IceDisconnected => FailureCause::Network,
            LinkFailure::Other(_) => FailureCause::Transport,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SessionError {
    #[error("invalid share code: {0}")]
    InvalidShareCode(#[from] ShareCodeError),

    #[error("a session is already in progress ({0:?})")]
    SessionBusy(SessionState),

    #[error("could not open the local endpoint: {0}")]
    Endpoint(String),

    #[error("connection to {target} failed after {attempts} attempt(s): {cause}")]
    ConnectionFailed {
        target: PeerId,
        attempts: u32,
        cause: FailureCause,
    },

    #[error("connection to host {target} lost; reconnect failed after {attempts} attempt(s): {cause}")]
    HostLost {
        target: PeerId,
        attempts: u32,
        cause: FailureCause,
    },
}

impl SessionError {
    /// A short, actionable sentence for an alert dialog.
    pub fn user_message(&self) -> String {
        let text = match self {
            SessionError::InvalidShareCode(_) => {
                "That code doesn't look right. Share codes are 5 letters or digits."
            }
            SessionError::SessionBusy(_) => {
                "A session is already running. Stop it before starting another."
            }
            SessionError::Endpoint(_) => "Could not start the session. Please try again.",
            SessionError::ConnectionFailed { cause, .. } => match cause {
                FailureCause::Network => {
                    "Could not reach the host. A network or firewall may be blocking the connection."
                }
                FailureCause::PeerUnavailable => {
                    "No session found for that code. Check the code and try again."
                }
                FailureCause::Timeout | FailureCause::Closed | FailureCause::Transport => {
                    "Could not connect to host. Check the code and try again."
                }
            },
            SessionError::HostLost { .. } => "Connection to the host was lost.",
        };
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_failure_mentions_firewall() {
        let err = SessionError::ConnectionFailed {
            target: "K7M2P".into(),
            attempts: 4,
            cause: FailureCause::Network,
        };
        assert!(err.user_message().contains("firewall"));
    }

    #[test]
    fn test_timeout_message_is_generic_and_actionable() {
        let err = SessionError::ConnectionFailed {
            target: "K7M2P".into(),
            attempts: 4,
            cause: FailureCause::Timeout,
        };
        assert_eq!(
            err.user_message(),
            "Could not connect to host. Check the code and try again."
        );
        assert!(err.to_string().contains("4 attempt(s)"));
    }

    #[test]
    fn test_ice_failures_map_to_network_cause() {
        assert_eq!(FailureCause::from(&LinkFailure::IceFailed), FailureCause::Network);
        assert_eq!(
            FailureCause::from(&LinkFailure::IceDisconnected),
            FailureCause::Network
        );
        assert_eq!(
            FailureCause::from(&LinkFailure::PeerUnavailable),
            FailureCause::PeerUnavailable
        );
    }
}
