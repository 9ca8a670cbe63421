//! Session lifecycle states and the notifications the engine emits.
//!
//! # Lifecycle (for beginners)
//!
//! ```text
//! Idle ──start/join──► Starting ──endpoint ready──► Waiting ──first link open──► Active
//!  ▲                                                  ▲                            │
//!  │                                                  └────── last link closed ────┘
//!  └──────────────── Stopping ◄──────── stop() from any state ─────────────────────┘
//! ```
//!
//! - `Waiting`: the endpoint is up but nobody is connected.  A host sits here
//!   until the first joiner arrives; it also returns here when the last
//!   joiner leaves, keeping its role and share code.
//! - `Active`: at least one peer link is open.
//!
//! UI collaborators either implement [`SessionObserver`] and subscribe, or
//! drain [`SessionEvent`]s after each call into the controller.

use annomesh_core::protocol::ChatFile;
use annomesh_core::{MediaKind, PeerId, Point};

use super::error::SessionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Starting,
    Waiting,
    Active,
    Stopping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Host,
    Joiner,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    StateChanged(SessionState),
    /// A direct link to `0` opened.
    PeerJoined(PeerId),
    /// A direct link to `0` closed.
    PeerLeft(PeerId),
    /// The host reported another participant joining.
    ParticipantJoined(PeerId),
    ParticipantLeft(PeerId),
    /// The peer-origin elements or the local history changed because of a
    /// remote message.
    AnnotationsChanged,
    PointerMoved {
        peer_id: PeerId,
        position: Point,
    },
    ChatReceived {
        peer_id: PeerId,
        message_id: String,
        text: Option<String>,
        file: Option<ChatFile>,
    },
    ReactionReceived {
        peer_id: PeerId,
        message_id: String,
        emoji: String,
    },
    MediaStarted {
        peer_id: PeerId,
        kind: MediaKind,
    },
    MediaEnded {
        peer_id: PeerId,
        kind: MediaKind,
    },
    RemoteMediaState {
        peer_id: PeerId,
        kind: MediaKind,
        active: bool,
    },
    /// Transient, non-fatal status for the user.
    Notice(String),
    /// A terminal failure; `message` is the alert text.
    Failed {
        error: SessionError,
        message: String,
    },
}

/// Callback interface for UI collaborators.
///
/// Every method has an empty default so observers implement only what they
/// care about.  [`on_event`](Self::on_event) sees every event, including the
/// ones routed to the specific callbacks.
pub trait SessionObserver: Send {
    fn on_state_changed(&mut self, _state: SessionState) {}

    fn on_peer_joined(&mut self, _peer_id: &str) {}

    fn on_peer_left(&mut self, _peer_id: &str) {}

    fn on_event(&mut self, _event: &SessionEvent) {}
}

impl SessionEvent {
    pub(crate) fn notify(&self, observer: &mut dyn SessionObserver) {
        match self {
            SessionEvent::StateChanged(state) => observer.on_state_changed(*state),
            SessionEvent::PeerJoined(peer) => observer.on_peer_joined(peer),
            SessionEvent::PeerLeft(peer) => observer.on_peer_left(peer),
            _ => {}
        }
        observer.on_event(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        states: Vec<SessionState>,
        joined: Vec<String>,
        all: usize,
    }

    impl SessionObserver for Recorder {
        fn on_state_changed(&mut self, state: SessionState) {
            self.states.push(state);
        }

        fn on_peer_joined(&mut self, peer_id: &str) {
            self.joined.push(peer_id.to_string());
        }

        fn on_event(&mut self, _event: &SessionEvent) {
            self.all += 1;
        }
    }

    #[test]
    fn test_notify_routes_to_specific_callback_and_on_event() {
        // Arrange
        let mut recorder = Recorder::default();

        // Act
        SessionEvent::StateChanged(SessionState::Active).notify(&mut recorder);
        SessionEvent::PeerJoined("p1".into()).notify(&mut recorder);
        SessionEvent::AnnotationsChanged.notify(&mut recorder);

        // Assert
        assert_eq!(recorder.states, vec![SessionState::Active]);
        assert_eq!(recorder.joined, vec!["p1"]);
        assert_eq!(recorder.all, 3);
    }
}
