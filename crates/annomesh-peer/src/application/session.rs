//! SessionController: the single owner of one collaboration session.
//!
//! # Responsibilities
//!
//! - Start hosting under a fresh share code, or join someone else's code.
//! - Feed transport events through the [`ConnectionManager`] and react to
//!   links opening and closing (full sync, presence, media re-offer,
//!   joiner auto-reconnect).
//! - Decode inbound frames, dispatch them, and on the host relay them to
//!   every other participant through the [`RebroadcastRouter`].
//! - Expose the local annotation operations and send whatever the
//!   [`AnnotationReplicator`] queues.
//! - Publish [`SessionEvent`]s to subscribed observers and to a drainable log.
//!
//! # Driving the controller
//!
//! The controller is synchronous and never reads the clock.  A driver calls:
//!
//! ```text
//! start_hosting() / join_with_code(code)
//! loop {
//!     handle_transport_event(event, now)   // for every transport completion
//!     poll_timers(now)                      // at or after next_deadline()
//!     take_events()                         // hand events to the UI
//! }
//! stop()
//! ```

use std::collections::BTreeSet;

use annomesh_core::protocol::{decode_message, ChatFile, WireMessage};
use annomesh_core::{
    AnnotationElement, ElementId, ElementPatch, Frame, MediaKind, MessageBody, PeerId, Point,
    SelectionSet, ShareCode, Style, Tool,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use super::channel::{ChannelError, MessageChannel};
use super::connection::{ConnectionEvent, ConnectionManager, MediaCall};
use super::context::SessionConfig;
use super::error::{FailureCause, SessionError};
use super::events::{Role, SessionEvent, SessionObserver, SessionState};
use super::replicator::{AnnotationReplicator, InboundOutcome};
use super::router::RebroadcastRouter;
use super::transport::{Transport, TransportEvent};

/// The live session, present between start/join and stop.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub role: Role,
    pub share_code: ShareCode,
    /// Our transport identity: the share code for a host, a UUID for a joiner.
    pub local_peer_id: PeerId,
    /// Set once the first peer link opens.
    pub collaborating: bool,
}

pub struct SessionController<T: Transport> {
    config: SessionConfig,
    transport: T,
    state: SessionState,
    session: Option<Session>,
    /// Set while a joiner re-dials a host it lost.
    reconnecting: bool,
    connections: ConnectionManager,
    router: RebroadcastRouter,
    replicator: AnnotationReplicator,
    local_media: BTreeSet<MediaKind>,
    observers: Vec<Box<dyn SessionObserver>>,
    events: Vec<SessionEvent>,
    rng: StdRng,
}

impl<T: Transport> SessionController<T> {
    pub fn new(transport: T, config: SessionConfig) -> Self {
        Self::with_rng(transport, config, StdRng::from_entropy())
    }

    /// A controller whose share codes are reproducible.
    pub fn with_seed(transport: T, config: SessionConfig, seed: u64) -> Self {
        Self::with_rng(transport, config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(transport: T, config: SessionConfig, rng: StdRng) -> Self {
        let connections = ConnectionManager::new(config.connection.clone(), config.race.clone());
        let replicator = AnnotationReplicator::new(config.canvas);
        Self {
            config,
            transport,
            state: SessionState::Idle,
            session: None,
            reconnecting: false,
            connections,
            router: RebroadcastRouter::new(),
            replicator,
            local_media: BTreeSet::new(),
            observers: Vec::new(),
            events: Vec::new(),
            rng,
        }
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn role(&self) -> Option<Role> {
        self.session.as_ref().map(|s| s.role)
    }

    pub fn share_code(&self) -> Option<&ShareCode> {
        self.session.as_ref().map(|s| &s.share_code)
    }

    pub fn local_peer_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.local_peer_id.as_str())
    }

    pub fn is_collaborating(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.collaborating)
    }

    /// Peers with an open link, ordered by id.
    pub fn connected_peers(&self) -> Vec<PeerId> {
        self.connections.open_peers()
    }

    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    pub fn replicator(&self) -> &AnnotationReplicator {
        &self.replicator
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Media kinds we are currently sharing.
    pub fn local_media(&self) -> impl Iterator<Item = &MediaKind> {
        self.local_media.iter()
    }

    pub fn router(&self) -> &RebroadcastRouter {
        &self.router
    }

    // ── Observers ─────────────────────────────────────────────────────────────

    pub fn subscribe(&mut self, observer: Box<dyn SessionObserver>) {
        self.observers.push(observer);
    }

    /// Drains the event log.
    pub fn take_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    fn emit(&mut self, event: SessionEvent) {
        for observer in &mut self.observers {
            event.notify(observer.as_mut());
        }
        self.events.push(event);
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state != state {
            debug!(from = ?self.state, to = ?state, "session state");
            self.state = state;
            self.emit(SessionEvent::StateChanged(state));
        }
    }

    // ── Session control ───────────────────────────────────────────────────────

    /// Opens an endpoint addressed by a fresh share code and waits for
    /// joiners.
    ///
    /// # Errors
    ///
    /// [`SessionError::SessionBusy`] if a session exists, or
    /// [`SessionError::Endpoint`] if the transport refuses the endpoint.
    pub fn start_hosting(&mut self) -> Result<ShareCode, SessionError> {
        self.ensure_idle()?;
        let code = ShareCode::generate(&mut self.rng);
        info!(%code, "hosting session");
        self.begin_session(Role::Host, code.clone(), code.to_string())?;
        Ok(code)
    }

    /// Joins the session published under `code`.
    ///
    /// The connect itself starts once the local endpoint is ready.
    ///
    /// # Errors
    ///
    /// [`SessionError::InvalidShareCode`] for malformed input (no connection
    /// is attempted), [`SessionError::SessionBusy`], or
    /// [`SessionError::Endpoint`].
    pub fn join_with_code(&mut self, code: &str) -> Result<(), SessionError> {
        self.ensure_idle()?;
        let code = ShareCode::parse(code)?;
        let address = Uuid::new_v4().to_string();
        info!(%code, %address, "joining session");
        self.begin_session(Role::Joiner, code, address)
    }

    fn ensure_idle(&self) -> Result<(), SessionError> {
        if self.state == SessionState::Idle {
            Ok(())
        } else {
            Err(SessionError::SessionBusy(self.state))
        }
    }

    fn begin_session(
        &mut self,
        role: Role,
        share_code: ShareCode,
        local_peer_id: PeerId,
    ) -> Result<(), SessionError> {
        self.connections =
            ConnectionManager::new(self.config.connection.clone(), self.config.race.clone());
        self.connections.set_accept_inbound(role == Role::Host);
        self.replicator.set_local_peer(local_peer_id.clone());
        self.reconnecting = false;
        self.session = Some(Session {
            role,
            share_code,
            local_peer_id: local_peer_id.clone(),
            collaborating: false,
        });
        self.set_state(SessionState::Starting);

        if let Err(e) = self
            .transport
            .open_endpoint(&local_peer_id, &self.config.ice_servers)
        {
            error!(error = %e, "could not open endpoint");
            self.session = None;
            self.set_state(SessionState::Idle);
            return Err(SessionError::Endpoint(e.to_string()));
        }
        Ok(())
    }

    /// Tears the session down: every link, call, attempt, and timer.
    /// Calling it again, or without a session, does nothing.
    pub fn stop(&mut self) {
        if self.session.is_none() {
            return;
        }
        self.set_state(SessionState::Stopping);
        let peers = self.connections.close_all(&mut self.transport);
        for peer in peers {
            self.emit(SessionEvent::PeerLeft(peer));
        }
        self.transport.destroy_endpoint();
        self.replicator.reset_remote();
        self.local_media.clear();
        self.reconnecting = false;
        self.session = None;
        info!("session stopped");
        self.set_state(SessionState::Idle);
    }

    fn fail(&mut self, error: SessionError) {
        error!(%error, "session failed");
        let message = error.user_message();
        self.emit(SessionEvent::Failed { error, message });
        self.stop();
    }

    // ── Driving ───────────────────────────────────────────────────────────────

    /// Applies one transport completion.  Events arriving without a session
    /// (e.g. after [`stop`](Self::stop)) are ignored.
    pub fn handle_transport_event(&mut self, event: TransportEvent, now: std::time::Instant) {
        let Some(role) = self.role() else {
            debug!(?event, "transport event without a session ignored");
            return;
        };
        match event {
            TransportEvent::EndpointReady { address } => {
                if self.state != SessionState::Starting {
                    return;
                }
                info!(%address, "endpoint ready");
                self.set_state(SessionState::Waiting);
                if role == Role::Joiner {
                    self.connect_to_host(now);
                }
            }
            TransportEvent::EndpointFailed { reason } => {
                self.fail(SessionError::Endpoint(reason));
            }
            TransportEvent::IncomingCall { call, remote, kind } => {
                if !self.connections.is_open(&remote) {
                    debug!(%call, %remote, "call from unconnected peer declined");
                    self.transport.hang_up(call);
                    return;
                }
                match self.transport.answer(call) {
                    Ok(()) => {
                        self.connections.register_call(
                            &remote,
                            MediaCall {
                                call,
                                kind,
                                outgoing: false,
                            },
                        );
                    }
                    Err(e) => warn!(%call, %remote, error = %e, "could not answer call"),
                }
            }
            TransportEvent::CallStream { call } => {
                if let Some((peer_id, media)) = self.connections.call_owner(call) {
                    if !media.outgoing {
                        self.emit(SessionEvent::MediaStarted {
                            peer_id,
                            kind: media.kind,
                        });
                    }
                }
            }
            TransportEvent::CallClosed { call } => {
                if let Some((peer_id, media)) = self.connections.remove_call(call) {
                    if !media.outgoing {
                        self.emit(SessionEvent::MediaEnded {
                            peer_id,
                            kind: media.kind,
                        });
                    }
                }
            }
            link_event => {
                let events = self
                    .connections
                    .handle_event(&mut self.transport, link_event, now);
                self.process(events, now);
            }
        }
    }

    /// Fires due timers (connect timeouts, retries, notices).
    pub fn poll_timers(&mut self, now: std::time::Instant) {
        if self.session.is_none() {
            return;
        }
        let events = self.connections.poll_timers(&mut self.transport, now);
        self.process(events, now);
    }

    pub fn next_deadline(&self) -> Option<std::time::Instant> {
        self.connections.next_deadline()
    }

    fn connect_to_host(&mut self, now: std::time::Instant) {
        let Some(host) = self.session.as_ref().map(|s| s.share_code.to_string()) else {
            return;
        };
        let events = self.connections.connect(&mut self.transport, &host, now);
        self.process(events, now);
    }

    fn process(&mut self, events: Vec<ConnectionEvent>, now: std::time::Instant) {
        for event in events {
            if self.session.is_none() {
                break;
            }
            match event {
                ConnectionEvent::LinkOpened { peer_id, .. } => self.on_link_open(peer_id),
                ConnectionEvent::LinkClosed { peer_id, media, .. } => {
                    self.on_link_closed(peer_id, media, now);
                }
                ConnectionEvent::MessageReceived { peer_id, payload } => {
                    self.on_frame(&peer_id, &payload);
                }
                ConnectionEvent::InboundRejected { .. } | ConnectionEvent::InboundReplaced { .. } => {}
                ConnectionEvent::RetryScheduled {
                    target,
                    next_attempt,
                    ..
                } => {
                    debug!(%target, next_attempt, "waiting to retry");
                }
                ConnectionEvent::PeerUnavailableNotice { .. } => {
                    self.emit(SessionEvent::Notice(
                        "Waiting for the host to come online...".to_string(),
                    ));
                }
                ConnectionEvent::AttemptsExhausted {
                    target,
                    attempts,
                    cause,
                } => {
                    let error = if self.reconnecting {
                        SessionError::HostLost {
                            target,
                            attempts,
                            cause,
                        }
                    } else {
                        SessionError::ConnectionFailed {
                            target,
                            attempts,
                            cause,
                        }
                    };
                    self.fail(error);
                }
            }
        }
    }

    // ── Link lifecycle ────────────────────────────────────────────────────────

    fn on_link_open(&mut self, peer: PeerId) {
        let Some(role) = self.role() else {
            return;
        };
        info!(%peer, ?role, "peer connected");
        self.reconnecting = false;
        if let Some(session) = self.session.as_mut() {
            session.collaborating = true;
        }
        self.replicator.set_collaborating(true);
        self.set_state(SessionState::Active);
        self.emit(SessionEvent::PeerJoined(peer.clone()));

        if role == Role::Host {
            let sync = self.replicator.full_sync_snapshot();
            self.send_or_warn(&peer, sync);

            let others: Vec<_> = self
                .connections
                .open_links()
                .into_iter()
                .filter(|(p, _)| *p != peer)
                .collect();
            self.channel().send_to_all(
                &others,
                WireMessage::anonymous(MessageBody::PeerJoined {
                    participant: peer.clone(),
                }),
            );
            for (other, _) in others {
                self.send_or_warn(&peer, MessageBody::PeerJoined { participant: other });
            }
        }

        let media: Vec<_> = self.local_media.iter().copied().collect();
        for kind in media {
            self.offer_media(&peer, kind);
        }
    }

    fn on_link_closed(&mut self, peer: PeerId, media: Vec<MediaCall>, now: std::time::Instant) {
        let Some(role) = self.role() else {
            return;
        };
        info!(%peer, "peer disconnected");
        for call in media {
            self.transport.hang_up(call.call);
            if !call.outgoing {
                self.emit(SessionEvent::MediaEnded {
                    peer_id: peer.clone(),
                    kind: call.kind,
                });
            }
        }
        self.replicator.forget_peer(&peer);
        self.emit(SessionEvent::PeerLeft(peer.clone()));

        if role == Role::Host {
            self.send_to_all_peers(MessageBody::PeerLeft {
                participant: peer.clone(),
            });
        }

        if self.connections.has_open_links() {
            return;
        }
        if let Some(session) = self.session.as_mut() {
            session.collaborating = false;
        }
        self.replicator.set_collaborating(false);
        self.set_state(SessionState::Waiting);

        if role == Role::Joiner && self.config.auto_reconnect {
            warn!(host = %peer, "lost the host; reconnecting");
            self.reconnecting = true;
            self.emit(SessionEvent::Notice(
                "Connection to the host dropped. Reconnecting...".to_string(),
            ));
            self.connect_to_host(now);
        } else if role == Role::Joiner {
            self.fail(SessionError::HostLost {
                target: peer,
                attempts: 0,
                cause: FailureCause::Closed,
            });
        }
    }

    // ── Inbound ───────────────────────────────────────────────────────────────

    fn on_frame(&mut self, link_peer: &str, payload: &str) {
        let msg = match decode_message(payload) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(peer = %link_peer, error = %e, "dropping undecodable frame");
                return;
            }
        };
        let Some(role) = self.role() else {
            return;
        };
        // The host trusts the link, not the claim; joiners keep the original
        // sender of relayed messages.
        let origin = match role {
            Role::Host => link_peer.to_string(),
            Role::Joiner => msg.peer_id.clone().unwrap_or_else(|| link_peer.to_string()),
        };
        self.dispatch(&origin, link_peer, &msg.body);

        if role == Role::Host && self.session.is_some() {
            let snapshot = self.connections.open_links();
            let targets = self.router.targets(&snapshot, link_peer, &msg.body);
            if !targets.is_empty() {
                self.channel()
                    .send_to_all(&targets, WireMessage::new(origin, msg.body));
            }
        }
    }

    fn is_host_link(&self, link_peer: &str) -> bool {
        self.role() == Some(Role::Joiner)
            && self
                .session
                .as_ref()
                .is_some_and(|s| s.share_code.as_str() == link_peer)
    }

    fn dispatch(&mut self, origin: &str, link_peer: &str, body: &MessageBody) {
        match body {
            MessageBody::SyncRequest => {
                if self.role() == Some(Role::Host) {
                    debug!(peer = %link_peer, "resending full state");
                    let sync = self.replicator.full_sync_snapshot();
                    self.send_or_warn(link_peer, sync);
                }
            }
            MessageBody::AnnotationSync { .. } => {
                // Full state only ever flows from the host to a joiner.
                if !self.is_host_link(link_peer) {
                    trace!(peer = %link_peer, "dropping full sync from a non-host peer");
                    return;
                }
                if self.replicator.apply_inbound(origin, body) == InboundOutcome::Applied {
                    self.emit(SessionEvent::AnnotationsChanged);
                }
            }
            MessageBody::PointerMove { nx, ny } => {
                let position = self.replicator.record_pointer(origin, *nx, *ny);
                self.emit(SessionEvent::PointerMoved {
                    peer_id: origin.to_string(),
                    position,
                });
            }
            MessageBody::ChatMessage {
                message_id,
                text,
                file,
            } => {
                self.emit(SessionEvent::ChatReceived {
                    peer_id: origin.to_string(),
                    message_id: message_id.clone(),
                    text: text.clone(),
                    file: file.clone(),
                });
            }
            MessageBody::ChatReaction { message_id, emoji } => {
                self.emit(SessionEvent::ReactionReceived {
                    peer_id: origin.to_string(),
                    message_id: message_id.clone(),
                    emoji: emoji.clone(),
                });
            }
            MessageBody::PeerJoined { participant } => {
                if self.role() == Some(Role::Joiner) && Some(participant.as_str()) != self.local_peer_id() {
                    self.emit(SessionEvent::ParticipantJoined(participant.clone()));
                }
            }
            MessageBody::PeerLeft { participant } => {
                if self.role() == Some(Role::Joiner) {
                    self.replicator.forget_peer(participant);
                    self.emit(SessionEvent::ParticipantLeft(participant.clone()));
                }
            }
            MessageBody::MediaState { kind, active } => {
                self.emit(SessionEvent::RemoteMediaState {
                    peer_id: origin.to_string(),
                    kind: *kind,
                    active: *active,
                });
            }
            MessageBody::AnnotationStart { .. }
            | MessageBody::AnnotationMove { .. }
            | MessageBody::AnnotationEnd { .. }
            | MessageBody::AnnotationElement { .. }
            | MessageBody::ElementUpdate { .. }
            | MessageBody::ElementDelete { .. }
            | MessageBody::AnnotationClear
            | MessageBody::GroupCreate { .. }
            | MessageBody::GroupUngroup { .. } => {
                if self.replicator.apply_inbound(origin, body) == InboundOutcome::Applied {
                    self.emit(SessionEvent::AnnotationsChanged);
                }
            }
        }
    }

    // ── Outbound ──────────────────────────────────────────────────────────────

    fn channel(&mut self) -> MessageChannel<'_, T> {
        let local = self
            .session
            .as_ref()
            .map(|s| s.local_peer_id.as_str())
            .unwrap_or_default();
        MessageChannel::new(&mut self.transport, local)
    }

    /// Sends `body` to every open link.  Returns how many links took it.
    pub fn send_to_all_peers(&mut self, body: MessageBody) -> usize {
        let links = self.connections.open_links();
        if links.is_empty() {
            return 0;
        }
        self.channel().send_to_all(&links, WireMessage::anonymous(body))
    }

    /// Sends `body` to one connected peer.
    ///
    /// # Errors
    ///
    /// [`ChannelError::NoLink`] if `peer` has no open link, or the channel's
    /// encode/transport error.
    pub fn send_to_peer(&mut self, peer: &str, body: MessageBody) -> Result<(), ChannelError> {
        let link = self
            .connections
            .link_to(peer)
            .ok_or_else(|| ChannelError::NoLink(peer.to_string()))?;
        self.channel()
            .send_to_peer(link, WireMessage::anonymous(body))
    }

    fn send_or_warn(&mut self, peer: &str, body: MessageBody) {
        let kind = body.type_name();
        if let Err(e) = self.send_to_peer(peer, body) {
            warn!(%peer, kind, error = %e, "send failed");
        }
    }

    fn flush_outbound(&mut self) {
        for body in self.replicator.take_outbound() {
            self.send_to_all_peers(body);
        }
    }

    // ── Annotation operations ─────────────────────────────────────────────────

    pub fn begin_element(&mut self, tool: Tool, style: Style, at: Point) -> ElementId {
        let id = self.replicator.begin_element(tool, style, at);
        self.flush_outbound();
        id
    }

    pub fn extend_element(&mut self, id: &str, point: Point) -> bool {
        let extended = self.replicator.extend_element(id, point);
        self.flush_outbound();
        extended
    }

    pub fn end_element(&mut self, id: &str) -> bool {
        let ended = self.replicator.end_element(id);
        self.flush_outbound();
        ended
    }

    pub fn add_element(&mut self, element: AnnotationElement) -> ElementId {
        let id = self.replicator.add_element(element);
        self.flush_outbound();
        id
    }

    pub fn update_element(&mut self, id: &str, patch: &ElementPatch) -> bool {
        let updated = self.replicator.update_element(id, patch);
        self.flush_outbound();
        updated
    }

    pub fn delete_element(&mut self, id: &str) -> bool {
        let deleted = self.replicator.delete_element(id);
        self.flush_outbound();
        deleted
    }

    pub fn undo(&mut self) -> Option<ElementId> {
        let id = self.replicator.undo();
        self.flush_outbound();
        id
    }

    pub fn redo(&mut self) -> Option<ElementId> {
        let id = self.replicator.redo();
        self.flush_outbound();
        id
    }

    pub fn clear_annotations(&mut self) {
        self.replicator.clear();
        self.flush_outbound();
    }

    pub fn group(&mut self, ids: &[ElementId]) -> Option<ElementId> {
        let id = self.replicator.group(ids);
        self.flush_outbound();
        id
    }

    pub fn group_selection(&mut self, selection: &mut SelectionSet) -> Option<ElementId> {
        let id = self.replicator.group_selection(selection);
        self.flush_outbound();
        id
    }

    pub fn ungroup(&mut self, group_id: &str) -> bool {
        let ungrouped = self.replicator.ungroup(group_id);
        self.flush_outbound();
        ungrouped
    }

    pub fn move_pointer(&mut self, at: Point) {
        self.replicator.move_pointer(at);
        self.flush_outbound();
    }

    pub fn set_canvas_frame(&mut self, frame: Frame) {
        self.replicator.set_canvas_frame(frame);
    }

    /// Asks the host to resend the full state.  `false` for a host or
    /// without a host link.
    pub fn request_full_sync(&mut self) -> bool {
        let Some(host) = self
            .session
            .as_ref()
            .filter(|s| s.role == Role::Joiner)
            .map(|s| s.share_code.to_string())
        else {
            return false;
        };
        self.send_to_peer(&host, MessageBody::SyncRequest).is_ok()
    }

    // ── Chat ──────────────────────────────────────────────────────────────────

    /// Broadcasts a chat message and returns its id.
    pub fn send_chat(&mut self, text: Option<String>, file: Option<ChatFile>) -> String {
        let message_id = Uuid::new_v4().to_string();
        self.send_to_all_peers(MessageBody::ChatMessage {
            message_id: message_id.clone(),
            text,
            file,
        });
        message_id
    }

    pub fn react(&mut self, message_id: &str, emoji: &str) {
        self.send_to_all_peers(MessageBody::ChatReaction {
            message_id: message_id.to_string(),
            emoji: emoji.to_string(),
        });
    }

    // ── Media ─────────────────────────────────────────────────────────────────

    /// Starts sharing `kind` with every connected peer, and with peers that
    /// connect later.
    pub fn start_media(&mut self, kind: MediaKind) {
        if !self.local_media.insert(kind) {
            return;
        }
        info!(?kind, "media sharing started");
        for peer in self.connections.open_peers() {
            self.offer_media(&peer, kind);
        }
    }

    pub fn stop_media(&mut self, kind: MediaKind) {
        if !self.local_media.remove(&kind) {
            return;
        }
        info!(?kind, "media sharing stopped");
        for call in self.connections.take_outgoing_calls(kind) {
            self.transport.hang_up(call);
        }
        self.send_to_all_peers(MessageBody::MediaState {
            kind,
            active: false,
        });
    }

    fn offer_media(&mut self, peer: &str, kind: MediaKind) {
        match self.transport.call(peer, kind) {
            Ok(call) => {
                self.connections.register_call(
                    peer,
                    MediaCall {
                        call,
                        kind,
                        outgoing: true,
                    },
                );
                self.send_or_warn(peer, MessageBody::MediaState { kind, active: true });
            }
            Err(e) => warn!(%peer, ?kind, error = %e, "could not place call"),
        }
    }
}
