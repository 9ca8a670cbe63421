//! Cancellable timers and the retry backoff policy.
//!
//! The engine owns no clock.  Timers are deadlines in a [`TimerQueue`]; the
//! driver asks for [`TimerQueue::next_deadline`], sleeps until then, and
//! hands the current `Instant` back in.  Tests drive the same code with
//! synthetic instants, so a 15-second connect timeout takes no real time.

use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

/// Longest delay a timer accepts; longer requests are cut down to this.
pub const MAX_TIMER_DELAY: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// Deadlines ordered by time, each carrying a payload `K`.
#[derive(Debug)]
pub struct TimerQueue<K> {
    next_id: u64,
    deadlines: BTreeMap<(Instant, TimerId), K>,
    index: HashMap<TimerId, Instant>,
}

impl<K> Default for TimerQueue<K> {
    fn default() -> Self {
        Self {
            next_id: 0,
            deadlines: BTreeMap::new(),
            index: HashMap::new(),
        }
    }
}

impl<K> TimerQueue<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules `payload` to fire `delay` after `now`, capped at
    /// [`MAX_TIMER_DELAY`].
    pub fn schedule_after(&mut self, now: Instant, delay: Duration, payload: K) -> TimerId {
        let at = now
            .checked_add(delay.min(MAX_TIMER_DELAY))
            .unwrap_or(now);
        self.schedule(at, payload)
    }

    pub fn schedule(&mut self, at: Instant, payload: K) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.deadlines.insert((at, id), payload);
        self.index.insert(id, at);
        id
    }

    /// Cancels a pending timer.  Returns its payload if it had not fired yet.
    pub fn cancel(&mut self, id: TimerId) -> Option<K> {
        let at = self.index.remove(&id)?;
        self.deadlines.remove(&(at, id))
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadlines.keys().next().map(|(at, _)| *at)
    }

    /// Removes and returns every timer due at or before `now`, earliest first.
    pub fn pop_due(&mut self, now: Instant) -> Vec<(TimerId, K)> {
        let mut due = Vec::new();
        while let Some(entry) = self.deadlines.first_entry() {
            if entry.key().0 > now {
                break;
            }
            let ((_, id), payload) = entry.remove_entry();
            self.index.remove(&id);
            due.push((id, payload));
        }
        due
    }

    pub fn clear(&mut self) {
        self.deadlines.clear();
        self.index.clear();
    }

    pub fn len(&self) -> usize {
        self.deadlines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deadlines.is_empty()
    }
}

/// Fixed-delay retry policy: `{attempt, max_attempts, base_delay}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    attempt: u32,
    max_attempts: u32,
    base_delay: Duration,
}

impl Backoff {
    /// A policy allowing one initial attempt plus `max_retries` retries.
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            attempt: 0,
            max_attempts: max_retries.saturating_add(1),
            base_delay,
        }
    }

    /// Records the start of an attempt and returns its 1-based number.
    pub fn record_attempt(&mut self) -> u32 {
        self.attempt = self.attempt.saturating_add(1);
        self.attempt
    }

    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before the next attempt, or `None` once the budget is spent.
    pub fn next_delay(&self) -> Option<Duration> {
        (self.attempt < self.max_attempts).then_some(self.base_delay)
    }

    /// Adds one attempt to the budget without counting it as a retry.
    pub fn grant_extra_attempt(&mut self) {
        self.max_attempts = self.max_attempts.saturating_add(1);
    }
}
