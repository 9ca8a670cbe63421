//! ConnectionManager: turns "connect to peer X" into a durable [`PeerLink`].
//!
//! # Joiner side: attempts, timeouts, retries
//!
//! ```text
//! connect(X) ──► attempt 1 ──open──► PeerLink registered
//!                   │
//!          timeout / error / closed
//!                   ▼
//!         retries left? ──yes──► wait retry_delay ──► attempt n+1
//!                   │
//!                   no ──► AttemptsExhausted (caller aborts the session)
//! ```
//!
//! At most one attempt per target is in flight.  Every timer carries the
//! link it was armed for and is ignored if that link is no longer the one
//! being tried, so a timeout can never fire against a newer attempt.
//!
//! # Host side: duplicate inbound links
//!
//! A joiner's retries can reach the host while an older link from the same
//! peer is still negotiating.  The host keeps one registered link per peer
//! id and resolves each newcomer against it, in order:
//!
//! 1. Registered link already open → reject the newcomer.
//! 2. Registered link negotiating (ICE checking/connected/completed) and
//!    younger than the grace period → reject the newcomer.
//! 3. Fewer than `max_replacements` replacements in the current window →
//!    close the registered link, register the newcomer.
//! 4. Otherwise → reject the newcomer.
//!
//! The replacement counter starts over after `replacement_window` without
//! replacements and is dropped once a link for that peer opens.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use annomesh_core::{MediaKind, PeerId};
use tracing::{debug, error, info, warn};

use super::context::{ConnectionPolicy, RacePolicy};
use super::error::FailureCause;
use super::timers::{Backoff, TimerId, TimerQueue};
use super::transport::{CallHandle, LinkHandle, Transport, TransportEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkDirection {
    /// The remote dialed us (host side).
    Inbound,
    /// We dialed the remote (joiner side).
    Outbound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Connecting,
    Open,
}

/// One media call riding alongside a peer link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaCall {
    pub call: CallHandle,
    pub kind: MediaKind,
    /// `true` if we placed the call.
    pub outgoing: bool,
}

/// The registered link to one remote participant.
#[derive(Debug, Clone)]
pub struct PeerLink {
    pub peer_id: PeerId,
    pub link: LinkHandle,
    pub direction: LinkDirection,
    pub state: LinkState,
    pub created_at: Instant,
    pub connected_at: Option<Instant>,
    pub media_calls: Vec<MediaCall>,
}

/// Why an inbound link was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    AlreadyOpen,
    NegotiationInProgress,
    ReplacementsExhausted,
    NotAccepting,
}

/// Events emitted by the connection manager to the session controller.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    LinkOpened {
        peer_id: PeerId,
        direction: LinkDirection,
    },
    /// A previously open link closed.  `media` lists calls that were riding on it.
    LinkClosed {
        peer_id: PeerId,
        direction: LinkDirection,
        media: Vec<MediaCall>,
    },
    MessageReceived {
        peer_id: PeerId,
        payload: String,
    },
    InboundRejected {
        peer_id: PeerId,
        reason: RejectReason,
    },
    InboundReplaced {
        peer_id: PeerId,
        replacements: u32,
    },
    RetryScheduled {
        target: PeerId,
        next_attempt: u32,
        delay: Duration,
        cause: FailureCause,
    },
    /// The target has been unreachable for the notice delay.
    PeerUnavailableNotice { target: PeerId },
    AttemptsExhausted {
        target: PeerId,
        attempts: u32,
        cause: FailureCause,
    },
}

#[derive(Debug)]
enum TimerKind {
    ConnectTimeout { target: PeerId, link: LinkHandle },
    Retry { target: PeerId },
    UnavailableNotice { target: PeerId },
}

#[derive(Debug)]
struct OutboundAttempt {
    backoff: Backoff,
    in_flight: Option<(LinkHandle, TimerId)>,
    retry_timer: Option<TimerId>,
    notice_timer: Option<TimerId>,
    extra_attempt_granted: bool,
}

#[derive(Debug)]
struct ReplacementWindow {
    count: u32,
    last: Instant,
}

pub struct ConnectionManager {
    policy: ConnectionPolicy,
    race: RacePolicy,
    links: HashMap<PeerId, PeerLink>,
    /// Registered links and in-flight attempt links, by handle.
    handles: HashMap<LinkHandle, PeerId>,
    attempts: HashMap<PeerId, OutboundAttempt>,
    replacements: HashMap<PeerId, ReplacementWindow>,
    timers: TimerQueue<TimerKind>,
    accept_inbound: bool,
}

impl ConnectionManager {
    pub fn new(policy: ConnectionPolicy, race: RacePolicy) -> Self {
        Self {
            policy,
            race,
            links: HashMap::new(),
            handles: HashMap::new(),
            attempts: HashMap::new(),
            replacements: HashMap::new(),
            timers: TimerQueue::new(),
            accept_inbound: false,
        }
    }

    /// Hosts accept inbound links; joiners refuse them.
    pub fn set_accept_inbound(&mut self, accept: bool) {
        self.accept_inbound = accept;
    }

    // ── Queries ───────────────────────────────────────────────────────────────

    pub fn is_open(&self, peer: &str) -> bool {
        self.links
            .get(peer)
            .is_some_and(|l| l.state == LinkState::Open)
    }

    /// Whether an outbound attempt (in flight or waiting to retry) exists.
    pub fn is_attempting(&self, peer: &str) -> bool {
        self.attempts.contains_key(peer)
    }

    pub fn has_open_links(&self) -> bool {
        self.links.values().any(|l| l.state == LinkState::Open)
    }

    /// Snapshot of open links, ordered by peer id.
    pub fn open_links(&self) -> Vec<(PeerId, LinkHandle)> {
        let mut open: Vec<_> = self
            .links
            .values()
            .filter(|l| l.state == LinkState::Open)
            .map(|l| (l.peer_id.clone(), l.link))
            .collect();
        open.sort();
        open
    }

    pub fn open_peers(&self) -> Vec<PeerId> {
        self.open_links().into_iter().map(|(peer, _)| peer).collect()
    }

    /// The open link to `peer`, if any.
    pub fn link_to(&self, peer: &str) -> Option<LinkHandle> {
        self.links
            .get(peer)
            .filter(|l| l.state == LinkState::Open)
            .map(|l| l.link)
    }

    /// The registered link for `peer`, open or still connecting.
    pub fn peer_link(&self, peer: &str) -> Option<&PeerLink> {
        self.links.get(peer)
    }

    /// Number of registered links, open or connecting.
    pub fn registered_count(&self) -> usize {
        self.links.len()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    // ── Media calls ───────────────────────────────────────────────────────────

    /// Records a call on `peer`'s link.  Returns `false` if no link is registered.
    pub fn register_call(&mut self, peer: &str, call: MediaCall) -> bool {
        match self.links.get_mut(peer) {
            Some(link) => {
                link.media_calls.push(call);
                true
            }
            None => false,
        }
    }

    pub fn call_owner(&self, call: CallHandle) -> Option<(PeerId, MediaCall)> {
        self.links.values().find_map(|l| {
            l.media_calls
                .iter()
                .find(|c| c.call == call)
                .map(|c| (l.peer_id.clone(), *c))
        })
    }

    pub fn remove_call(&mut self, call: CallHandle) -> Option<(PeerId, MediaCall)> {
        self.links.values_mut().find_map(|l| {
            let index = l.media_calls.iter().position(|c| c.call == call)?;
            Some((l.peer_id.clone(), l.media_calls.remove(index)))
        })
    }

    /// Our outgoing calls of `kind`, across every link.
    pub fn take_outgoing_calls(&mut self, kind: MediaKind) -> Vec<CallHandle> {
        let mut taken = Vec::new();
        for link in self.links.values_mut() {
            link.media_calls.retain(|c| {
                let matches = c.outgoing && c.kind == kind;
                if matches {
                    taken.push(c.call);
                }
                !matches
            });
        }
        taken
    }

    // ── Joiner side ───────────────────────────────────────────────────────────

    /// Starts connecting to `target` unless already connected or attempting.
    pub fn connect<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        target: &str,
        now: Instant,
    ) -> Vec<ConnectionEvent> {
        let mut events = Vec::new();
        if self.is_open(target) || self.is_attempting(target) {
            debug!(%target, "connect ignored: link open or attempt already in flight");
            return events;
        }
        self.attempts.insert(
            target.to_string(),
            OutboundAttempt {
                backoff: Backoff::new(self.policy.max_retries, self.policy.retry_delay),
                in_flight: None,
                retry_timer: None,
                notice_timer: None,
                extra_attempt_granted: false,
            },
        );
        self.start_attempt(transport, target, now, &mut events);
        events
    }

    fn start_attempt<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        target: &str,
        now: Instant,
        events: &mut Vec<ConnectionEvent>,
    ) {
        let Some(attempt) = self.attempts.get_mut(target) else {
            return;
        };
        let number = attempt.backoff.record_attempt();
        match transport.connect(target) {
            Ok(link) => {
                let timer = self.timers.schedule_after(
                    now,
                    self.policy.connect_timeout,
                    TimerKind::ConnectTimeout {
                        target: target.to_string(),
                        link,
                    },
                );
                attempt.in_flight = Some((link, timer));
                self.handles.insert(link, target.to_string());
                info!(%target, %link, attempt = number, "connecting");
            }
            Err(e) => {
                warn!(%target, attempt = number, error = %e, "transport refused connect");
                self.fail_attempt(transport, target, FailureCause::Transport, now, events);
            }
        }
    }

    fn fail_attempt<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        target: &str,
        cause: FailureCause,
        now: Instant,
        events: &mut Vec<ConnectionEvent>,
    ) {
        let Some(attempt) = self.attempts.get_mut(target) else {
            return;
        };
        if let Some((link, timer)) = attempt.in_flight.take() {
            self.timers.cancel(timer);
            self.handles.remove(&link);
            transport.close_link(link);
        }

        // A host that is still starting up looks unavailable; the first such
        // failure costs no retry and is only reported if it persists.
        if cause == FailureCause::PeerUnavailable
            && attempt.backoff.attempts() == 1
            && !attempt.extra_attempt_granted
        {
            attempt.extra_attempt_granted = true;
            attempt.backoff.grant_extra_attempt();
            if attempt.notice_timer.is_none() {
                attempt.notice_timer = Some(self.timers.schedule_after(
                    now,
                    self.policy.unavailable_notice_delay,
                    TimerKind::UnavailableNotice {
                        target: target.to_string(),
                    },
                ));
            }
        }

        match attempt.backoff.next_delay() {
            Some(delay) => {
                attempt.retry_timer = Some(self.timers.schedule_after(
                    now,
                    delay,
                    TimerKind::Retry {
                        target: target.to_string(),
                    },
                ));
                let next_attempt = attempt.backoff.attempts() + 1;
                warn!(%target, %cause, next_attempt, ?delay, "connect attempt failed; retrying");
                events.push(ConnectionEvent::RetryScheduled {
                    target: target.to_string(),
                    next_attempt,
                    delay,
                    cause,
                });
            }
            None => {
                let attempts = attempt.backoff.attempts();
                if let Some(notice) = attempt.notice_timer.take() {
                    self.timers.cancel(notice);
                }
                self.attempts.remove(target);
                error!(%target, %cause, attempts, "connect attempts exhausted");
                events.push(ConnectionEvent::AttemptsExhausted {
                    target: target.to_string(),
                    attempts,
                    cause,
                });
            }
        }
    }

    /// Fires every timer due at `now`.
    pub fn poll_timers<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        now: Instant,
    ) -> Vec<ConnectionEvent> {
        let mut events = Vec::new();
        for (_, kind) in self.timers.pop_due(now) {
            match kind {
                TimerKind::ConnectTimeout { target, link } => {
                    if self.in_flight_link(&target) == Some(link) {
                        self.fail_attempt(transport, &target, FailureCause::Timeout, now, &mut events);
                    } else {
                        debug!(%target, %link, "stale connect timeout ignored");
                    }
                }
                TimerKind::Retry { target } => {
                    let ready = match self.attempts.get_mut(&target) {
                        Some(attempt) => {
                            attempt.retry_timer = None;
                            attempt.in_flight.is_none()
                        }
                        None => false,
                    };
                    if ready && !self.is_open(&target) {
                        self.start_attempt(transport, &target, now, &mut events);
                    }
                }
                TimerKind::UnavailableNotice { target } => {
                    if let Some(attempt) = self.attempts.get_mut(&target) {
                        attempt.notice_timer = None;
                        events.push(ConnectionEvent::PeerUnavailableNotice { target });
                    }
                }
            }
        }
        events
    }

    fn in_flight_link(&self, target: &str) -> Option<LinkHandle> {
        self.attempts
            .get(target)
            .and_then(|a| a.in_flight)
            .map(|(link, _)| link)
    }

    fn registered_link(&self, peer: &str) -> Option<LinkHandle> {
        self.links.get(peer).map(|l| l.link)
    }

    // ── Transport events ──────────────────────────────────────────────────────

    /// Applies a link-level transport event.  Events for links this manager
    /// does not know (closed, replaced, or from before a reset) are ignored.
    pub fn handle_event<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        event: TransportEvent,
        now: Instant,
    ) -> Vec<ConnectionEvent> {
        let mut events = Vec::new();
        match event {
            TransportEvent::InboundLink { link, remote } => {
                self.on_inbound(transport, link, remote, now, &mut events);
            }
            TransportEvent::LinkOpen { link } => self.on_open(link, now, &mut events),
            TransportEvent::LinkData { link, payload } => {
                match self.handles.get(&link) {
                    Some(peer) if self.link_to(peer) == Some(link) => {
                        events.push(ConnectionEvent::MessageReceived {
                            peer_id: peer.clone(),
                            payload,
                        });
                    }
                    _ => debug!(%link, "data on unregistered link dropped"),
                }
            }
            TransportEvent::LinkClosed { link } => {
                self.on_closed(transport, link, FailureCause::Closed, now, &mut events);
            }
            TransportEvent::LinkError { link, failure } => {
                warn!(%link, ?failure, "link error");
                self.on_closed(transport, link, FailureCause::from(&failure), now, &mut events);
            }
            TransportEvent::EndpointReady { .. }
            | TransportEvent::EndpointFailed { .. }
            | TransportEvent::IncomingCall { .. }
            | TransportEvent::CallStream { .. }
            | TransportEvent::CallClosed { .. } => {}
        }
        events
    }

    fn on_inbound<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        link: LinkHandle,
        remote: PeerId,
        now: Instant,
        events: &mut Vec<ConnectionEvent>,
    ) {
        if !self.accept_inbound {
            self.reject(transport, link, remote, RejectReason::NotAccepting, events);
            return;
        }
        let existing = self
            .links
            .get(&remote)
            .map(|l| (l.link, l.state, l.created_at));
        let Some((old_link, old_state, created_at)) = existing else {
            self.register_inbound(link, remote, now);
            return;
        };

        if old_state == LinkState::Open {
            self.reject(transport, link, remote, RejectReason::AlreadyOpen, events);
            return;
        }
        if transport.negotiation_state(old_link).is_progressing()
            && now.duration_since(created_at) < self.race.grace_period
        {
            self.reject(transport, link, remote, RejectReason::NegotiationInProgress, events);
            return;
        }

        let window = self
            .replacements
            .entry(remote.clone())
            .or_insert(ReplacementWindow { count: 0, last: now });
        if now.duration_since(window.last) >= self.race.replacement_window {
            window.count = 0;
        }
        if window.count >= self.race.max_replacements {
            self.reject(transport, link, remote, RejectReason::ReplacementsExhausted, events);
            return;
        }
        window.count += 1;
        window.last = now;
        let replacements = window.count;

        self.handles.remove(&old_link);
        transport.close_link(old_link);
        debug!(peer = %remote, %old_link, new_link = %link, replacements, "replacing stale inbound link");
        self.register_inbound(link, remote.clone(), now);
        events.push(ConnectionEvent::InboundReplaced {
            peer_id: remote,
            replacements,
        });
    }

    fn register_inbound(&mut self, link: LinkHandle, remote: PeerId, now: Instant) {
        debug!(peer = %remote, %link, "inbound link registered");
        self.handles.insert(link, remote.clone());
        self.links.insert(
            remote.clone(),
            PeerLink {
                peer_id: remote,
                link,
                direction: LinkDirection::Inbound,
                state: LinkState::Connecting,
                created_at: now,
                connected_at: None,
                media_calls: Vec::new(),
            },
        );
    }

    fn reject<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        link: LinkHandle,
        remote: PeerId,
        reason: RejectReason,
        events: &mut Vec<ConnectionEvent>,
    ) {
        debug!(peer = %remote, %link, ?reason, "duplicate inbound link rejected");
        transport.close_link(link);
        events.push(ConnectionEvent::InboundRejected {
            peer_id: remote,
            reason,
        });
    }

    fn on_open(&mut self, link: LinkHandle, now: Instant, events: &mut Vec<ConnectionEvent>) {
        let Some(peer) = self.handles.get(&link).cloned() else {
            debug!(%link, "open for unknown link ignored");
            return;
        };

        if self.registered_link(&peer) == Some(link) {
            if let Some(entry) = self.links.get_mut(&peer) {
                entry.state = LinkState::Open;
                entry.connected_at = Some(now);
                self.replacements.remove(&peer);
                info!(%peer, %link, "inbound link open");
                events.push(ConnectionEvent::LinkOpened {
                    peer_id: peer,
                    direction: entry.direction,
                });
            }
            return;
        }

        if self.in_flight_link(&peer) == Some(link) {
            if let Some(attempt) = self.attempts.remove(&peer) {
                for timer in [
                    attempt.in_flight.map(|(_, t)| t),
                    attempt.retry_timer,
                    attempt.notice_timer,
                ]
                .into_iter()
                .flatten()
                {
                    self.timers.cancel(timer);
                }
                info!(%peer, %link, attempts = attempt.backoff.attempts(), "outbound link open");
            }
            self.links.insert(
                peer.clone(),
                PeerLink {
                    peer_id: peer.clone(),
                    link,
                    direction: LinkDirection::Outbound,
                    state: LinkState::Open,
                    created_at: now,
                    connected_at: Some(now),
                    media_calls: Vec::new(),
                },
            );
            events.push(ConnectionEvent::LinkOpened {
                peer_id: peer,
                direction: LinkDirection::Outbound,
            });
        }
    }

    fn on_closed<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        link: LinkHandle,
        cause: FailureCause,
        now: Instant,
        events: &mut Vec<ConnectionEvent>,
    ) {
        let Some(peer) = self.handles.get(&link).cloned() else {
            debug!(%link, "close for unknown link ignored");
            return;
        };

        if self.in_flight_link(&peer) == Some(link) {
            self.fail_attempt(transport, &peer, cause, now, events);
            return;
        }

        if self.registered_link(&peer) == Some(link) {
            self.handles.remove(&link);
            transport.close_link(link);
            if let Some(entry) = self.links.remove(&peer) {
                if entry.state == LinkState::Open {
                    info!(%peer, %link, %cause, "link closed");
                    events.push(ConnectionEvent::LinkClosed {
                        peer_id: peer,
                        direction: entry.direction,
                        media: entry.media_calls,
                    });
                } else {
                    debug!(%peer, %link, %cause, "pending inbound link closed before opening");
                }
            }
        }
    }

    /// Closes every link, call, and attempt and cancels every timer.
    ///
    /// Returns the peers whose links were open.
    pub fn close_all<T: Transport + ?Sized>(&mut self, transport: &mut T) -> Vec<PeerId> {
        let open = self.open_peers();
        for (_, link) in self.links.drain() {
            for call in link.media_calls {
                transport.hang_up(call.call);
            }
            transport.close_link(link.link);
        }
        for (_, attempt) in self.attempts.drain() {
            if let Some((link, _)) = attempt.in_flight {
                transport.close_link(link);
            }
        }
        self.handles.clear();
        self.replacements.clear();
        self.timers.clear();
        open
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
