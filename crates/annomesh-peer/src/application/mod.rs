//! Application layer: the peer engine.
//!
//! # What lives here? (for beginners)
//!
//! Everything that decides *what* happens in a session, with no sockets,
//! threads, or clocks of its own.  The network is reached through the
//! [`transport::Transport`] trait and time is passed in as `Instant`
//! arguments, so the whole layer runs the same inside a unit test, the
//! in-memory simulation, or a real driver loop.
//!
//! # Sub-modules
//!
//! - **`session`**    – `SessionController`, the single entry point: host,
//!   join, stop, annotation operations, chat, media.
//! - **`connection`** – `ConnectionManager`: joiner connect/timeout/retry and
//!   host-side resolution of duplicate inbound links.
//! - **`replicator`** – `AnnotationReplicator`: local history, peer-origin
//!   elements, and the messages that keep every participant converged.
//! - **`router`**     – `RebroadcastRouter`: the host's relay from one joiner
//!   to all the others.
//! - **`channel`**    – `MessageChannel`: encode-and-send over open links.
//! - **`transport`**  – the transport seam and its event vocabulary.
//! - **`timers`**     – `TimerQueue` and `Backoff`.
//! - **`context`**    – `SessionConfig` and its policies.
//! - **`events`**     – session states, `SessionEvent`, `SessionObserver`.
//! - **`error`**      – `SessionError` and user-facing alert text.

pub mod channel;
pub mod connection;
pub mod context;
pub mod error;
pub mod events;
pub mod replicator;
pub mod router;
pub mod session;
pub mod timers;
pub mod transport;
