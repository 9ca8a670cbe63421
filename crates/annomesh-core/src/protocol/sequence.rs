//! Element id generation.
//!
//! Element ids have the form `"{peer}-{millis}-{seq}"`: the originating
//! peer, the wall-clock time the element was created, and a per-process
//! counter.  The peer prefix makes ids unique across participants; the
//! counter keeps two elements created in the same millisecond apart.
//!
//! The counter uses `AtomicU64`, so a single generator can be shared between
//! threads behind an `Arc` without a lock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::domain::element::ElementId;

/// A thread-safe, monotonically increasing counter.
///
/// # Examples
///
/// ```rust
/// use annomesh_core::protocol::SequenceCounter;
///
/// let counter = SequenceCounter::new();
/// assert_eq!(counter.next(), 0);
/// assert_eq!(counter.next(), 1);
/// ```
#[derive(Debug, Default)]
pub struct SequenceCounter {
    inner: AtomicU64,
}

impl SequenceCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next value.  Wraps from `u64::MAX` to 0.
    pub fn next(&self) -> u64 {
        self.inner.fetch_add(1, Ordering::Relaxed)
    }

    pub fn current(&self) -> u64 {
        self.inner.load(Ordering::Relaxed)
    }
}

/// Builds element ids for one local peer.
#[derive(Debug, Default)]
pub struct ElementIdGenerator {
    counter: SequenceCounter,
}

impl ElementIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// An id stamped with the current wall-clock time.
    pub fn next_id(&self, peer_id: &str) -> ElementId {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        self.next_id_at(peer_id, millis)
    }

    /// An id stamped with an explicit timestamp.
    pub fn next_id_at(&self, peer_id: &str, millis: u64) -> ElementId {
        format!("{peer_id}-{millis}-{}", self.counter.next())
    }
}
