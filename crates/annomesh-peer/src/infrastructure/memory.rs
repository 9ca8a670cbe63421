//! In-memory transport for tests and simulations.
//!
//! A [`MemoryNetwork`] is a shared switchboard.  Each [`MemoryTransport`]
//! created from it is one endpoint with its own event inbox; the engine
//! drains the inbox with [`MemoryTransport::poll_events`] and feeds the
//! events into its session controller, exactly as a real driver would.
//!
//! Delivery is reliable and ordered.  Failures are injected on purpose:
//!
//! - [`set_unresponsive`](MemoryNetwork::set_unresponsive) – links to an
//!   address never open (the connect timeout fires);
//! - [`fail_next_connects`](MemoryNetwork::fail_next_connects) – the next
//!   *n* connects to an address fail with a chosen [`LinkFailure`];
//! - [`set_auto_open`](MemoryNetwork::set_auto_open) – when off, links stay
//!   negotiating until [`open_link`](MemoryNetwork::open_link) is called;
//! - [`set_negotiation_state`](MemoryNetwork::set_negotiation_state) and
//!   [`disconnect`](MemoryNetwork::disconnect).

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use annomesh_core::{MediaKind, PeerId};
use tracing::trace;

use crate::application::transport::{
    CallHandle, IceServer, LinkFailure, LinkHandle, NegotiationState, Transport, TransportError,
    TransportEvent,
};

type EndpointId = u64;

/// One frame handed from one address to another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub from: PeerId,
    pub to: PeerId,
    pub payload: String,
}

#[derive(Debug, Default)]
struct Endpoint {
    address: Option<PeerId>,
    inbox: VecDeque<TransportEvent>,
}

#[derive(Debug)]
struct LinkEnd {
    owner: EndpointId,
    /// Address of the endpoint at the other end.
    remote: PeerId,
    peer: Option<LinkHandle>,
    state: NegotiationState,
    open: bool,
}

#[derive(Debug)]
struct CallEnd {
    owner: EndpointId,
    peer: CallHandle,
}

#[derive(Debug)]
struct NetworkState {
    next_endpoint: EndpointId,
    next_link: u64,
    next_call: u64,
    endpoints: HashMap<EndpointId, Endpoint>,
    addresses: HashMap<PeerId, EndpointId>,
    links: HashMap<LinkHandle, LinkEnd>,
    calls: HashMap<CallHandle, CallEnd>,
    unresponsive: HashSet<PeerId>,
    forced_failures: HashMap<PeerId, (LinkFailure, u32)>,
    auto_open: bool,
    connect_attempts: HashMap<PeerId, u32>,
    traffic: Vec<Delivery>,
}

impl Default for NetworkState {
    fn default() -> Self {
        Self {
            next_endpoint: 1,
            next_link: 1,
            next_call: 1,
            endpoints: HashMap::new(),
            addresses: HashMap::new(),
            links: HashMap::new(),
            calls: HashMap::new(),
            unresponsive: HashSet::new(),
            forced_failures: HashMap::new(),
            auto_open: true,
            connect_attempts: HashMap::new(),
            traffic: Vec::new(),
        }
    }
}

impl NetworkState {
    fn push(&mut self, endpoint: EndpointId, event: TransportEvent) {
        if let Some(ep) = self.endpoints.get_mut(&endpoint) {
            ep.inbox.push_back(event);
        }
    }

    fn address_of(&self, endpoint: EndpointId) -> Option<PeerId> {
        self.endpoints.get(&endpoint).and_then(|e| e.address.clone())
    }

    fn new_link(&mut self) -> LinkHandle {
        let link = LinkHandle(self.next_link);
        self.next_link += 1;
        link
    }

    fn new_call(&mut self) -> CallHandle {
        let call = CallHandle(self.next_call);
        self.next_call += 1;
        call
    }

    /// Removes `link` and tells the other end it closed.
    fn close(&mut self, link: LinkHandle) {
        let Some(end) = self.links.remove(&link) else {
            return;
        };
        if let Some(peer) = end.peer {
            if let Some(peer_end) = self.links.remove(&peer) {
                self.push(peer_end.owner, TransportEvent::LinkClosed { link: peer });
            }
        }
    }

    fn hang_up(&mut self, call: CallHandle) {
        let Some(end) = self.calls.remove(&call) else {
            return;
        };
        if let Some(peer_end) = self.calls.remove(&end.peer) {
            self.push(peer_end.owner, TransportEvent::CallClosed { call: end.peer });
        }
    }
}

/// Shared in-memory switchboard.  Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct MemoryNetwork {
    state: Arc<Mutex<NetworkState>>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, NetworkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Creates a new, not yet registered endpoint.
    pub fn transport(&self) -> MemoryTransport {
        let mut state = self.lock();
        let id = state.next_endpoint;
        state.next_endpoint += 1;
        state.endpoints.insert(id, Endpoint::default());
        MemoryTransport {
            network: self.clone(),
            id,
        }
    }

    // ── Fault injection ──────────────────────────────────────────────────────

    /// Links to `address` are accepted but never open.
    pub fn set_unresponsive(&self, address: &str, unresponsive: bool) {
        let mut state = self.lock();
        if unresponsive {
            state.unresponsive.insert(address.to_string());
        } else {
            state.unresponsive.remove(address);
        }
    }

    /// The next `count` connects to `address` fail with `failure`.
    pub fn fail_next_connects(&self, address: &str, failure: LinkFailure, count: u32) {
        self.lock()
            .forced_failures
            .insert(address.to_string(), (failure, count));
    }

    /// When off, new links stay negotiating until [`open_link`](Self::open_link).
    pub fn set_auto_open(&self, auto_open: bool) {
        self.lock().auto_open = auto_open;
    }

    /// Opens a negotiating link and its other end.  Returns `false` if the
    /// link is gone or has no other end.
    pub fn open_link(&self, link: LinkHandle) -> bool {
        let mut state = self.lock();
        let Some(peer) = state.links.get(&link).and_then(|l| l.peer) else {
            return false;
        };
        let mut opened = Vec::new();
        for handle in [link, peer] {
            if let Some(end) = state.links.get_mut(&handle) {
                end.open = true;
                end.state = NegotiationState::Connected;
                opened.push((end.owner, handle));
            }
        }
        for (owner, handle) in opened {
            state.push(owner, TransportEvent::LinkOpen { link: handle });
        }
        true
    }

    pub fn set_negotiation_state(&self, link: LinkHandle, negotiation: NegotiationState) {
        if let Some(end) = self.lock().links.get_mut(&link) {
            end.state = negotiation;
        }
    }

    /// Cuts every link of the endpoint at `address`; both sides see
    /// `LinkClosed`.
    pub fn disconnect(&self, address: &str) {
        let mut state = self.lock();
        let Some(endpoint) = state.addresses.get(address).copied() else {
            return;
        };
        let owned: Vec<_> = state
            .links
            .iter()
            .filter(|(_, end)| end.owner == endpoint)
            .map(|(handle, _)| *handle)
            .collect();
        for link in owned {
            state.push(endpoint, TransportEvent::LinkClosed { link });
            state.close(link);
        }
    }

    // ── Inspection ───────────────────────────────────────────────────────────

    /// How many times anyone dialed `address`.
    pub fn connect_attempts_to(&self, address: &str) -> u32 {
        self.lock()
            .connect_attempts
            .get(address)
            .copied()
            .unwrap_or(0)
    }

    /// Every frame delivered so far, in order.
    pub fn traffic(&self) -> Vec<Delivery> {
        self.lock().traffic.clone()
    }

    /// Frames delivered to `address`, in order.
    pub fn payloads_to(&self, address: &str) -> Vec<String> {
        self.lock()
            .traffic
            .iter()
            .filter(|d| d.to == address)
            .map(|d| d.payload.clone())
            .collect()
    }

    /// Links currently owned by the endpoint at `address`.
    pub fn links_of(&self, address: &str) -> Vec<LinkHandle> {
        let state = self.lock();
        let Some(endpoint) = state.addresses.get(address).copied() else {
            return Vec::new();
        };
        let mut links: Vec<_> = state
            .links
            .iter()
            .filter(|(_, end)| end.owner == endpoint)
            .map(|(handle, _)| *handle)
            .collect();
        links.sort();
        links
    }

    pub fn is_registered(&self, address: &str) -> bool {
        self.lock().addresses.contains_key(address)
    }
}

/// One endpoint on a [`MemoryNetwork`].
#[derive(Debug)]
pub struct MemoryTransport {
    network: MemoryNetwork,
    id: EndpointId,
}

impl MemoryTransport {
    /// Drains the events queued for this endpoint.
    pub fn poll_events(&self) -> Vec<TransportEvent> {
        let mut state = self.network.lock();
        state
            .endpoints
            .get_mut(&self.id)
            .map(|e| e.inbox.drain(..).collect())
            .unwrap_or_default()
    }

    pub fn has_pending_events(&self) -> bool {
        self.network
            .lock()
            .endpoints
            .get(&self.id)
            .is_some_and(|e| !e.inbox.is_empty())
    }

    pub fn address(&self) -> Option<PeerId> {
        self.network.lock().address_of(self.id)
    }

    pub fn network(&self) -> &MemoryNetwork {
        &self.network
    }
}

impl Transport for MemoryTransport {
    fn open_endpoint(
        &mut self,
        address: &str,
        _ice_servers: &[IceServer],
    ) -> Result<(), TransportError> {
        let mut state = self.network.lock();
        let owner = state.addresses.get(address).copied();
        match owner {
            Some(owner) if owner != self.id => {
                state.push(
                    self.id,
                    TransportEvent::EndpointFailed {
                        reason: format!("address {address} is already taken"),
                    },
                );
            }
            _ => {
                state.addresses.insert(address.to_string(), self.id);
                if let Some(ep) = state.endpoints.get_mut(&self.id) {
                    ep.address = Some(address.to_string());
                }
                state.push(
                    self.id,
                    TransportEvent::EndpointReady {
                        address: address.to_string(),
                    },
                );
            }
        }
        Ok(())
    }

    fn destroy_endpoint(&mut self) {
        let mut state = self.network.lock();
        let links: Vec<_> = state
            .links
            .iter()
            .filter(|(_, end)| end.owner == self.id)
            .map(|(handle, _)| *handle)
            .collect();
        for link in links {
            state.close(link);
        }
        let calls: Vec<_> = state
            .calls
            .iter()
            .filter(|(_, end)| end.owner == self.id)
            .map(|(handle, _)| *handle)
            .collect();
        for call in calls {
            state.hang_up(call);
        }
        if let Some(address) = state.address_of(self.id) {
            if state.addresses.get(&address) == Some(&self.id) {
                state.addresses.remove(&address);
            }
        }
        if let Some(ep) = state.endpoints.get_mut(&self.id) {
            ep.address = None;
            ep.inbox.clear();
        }
    }

    fn connect(&mut self, remote: &str) -> Result<LinkHandle, TransportError> {
        let mut state = self.network.lock();
        let local = state.address_of(self.id).ok_or(TransportError::NoEndpoint)?;
        *state.connect_attempts.entry(remote.to_string()).or_insert(0) += 1;
        let link = state.new_link();
        let mut end = LinkEnd {
            owner: self.id,
            remote: remote.to_string(),
            peer: None,
            state: NegotiationState::New,
            open: false,
        };

        let forced = match state.forced_failures.get_mut(remote) {
            Some((failure, count)) if *count > 0 => {
                *count -= 1;
                Some(failure.clone())
            }
            _ => None,
        };
        if let Some(failure) = forced {
            end.state = NegotiationState::Failed;
            state.links.insert(link, end);
            state.push(self.id, TransportEvent::LinkError { link, failure });
            return Ok(link);
        }

        let remote_id = state.addresses.get(remote).copied();
        let Some(remote_id) = remote_id else {
            state.links.insert(link, end);
            state.push(
                self.id,
                TransportEvent::LinkError {
                    link,
                    failure: LinkFailure::PeerUnavailable,
                },
            );
            return Ok(link);
        };

        if state.unresponsive.contains(remote) {
            end.state = NegotiationState::Checking;
            state.links.insert(link, end);
            return Ok(link);
        }

        let far = state.new_link();
        let auto_open = state.auto_open;
        let negotiation = if auto_open {
            NegotiationState::Connected
        } else {
            NegotiationState::Checking
        };
        end.peer = Some(far);
        end.state = negotiation;
        end.open = auto_open;
        state.links.insert(link, end);
        state.links.insert(
            far,
            LinkEnd {
                owner: remote_id,
                remote: local.clone(),
                peer: Some(link),
                state: negotiation,
                open: auto_open,
            },
        );
        state.push(
            remote_id,
            TransportEvent::InboundLink {
                link: far,
                remote: local,
            },
        );
        if auto_open {
            state.push(remote_id, TransportEvent::LinkOpen { link: far });
            state.push(self.id, TransportEvent::LinkOpen { link });
        }
        Ok(link)
    }

    fn send(&mut self, link: LinkHandle, payload: &str) -> Result<(), TransportError> {
        let mut state = self.network.lock();
        let end = state
            .links
            .get(&link)
            .filter(|end| end.owner == self.id)
            .ok_or(TransportError::UnknownLink(link))?;
        let (Some(peer), true) = (end.peer, end.open) else {
            return Err(TransportError::LinkClosed(link));
        };
        let to = end.remote.clone();
        let receiver = state
            .links
            .get(&peer)
            .map(|e| e.owner)
            .ok_or(TransportError::LinkClosed(link))?;
        let from = state.address_of(self.id).unwrap_or_default();
        trace!(%from, %to, %link, "memory frame");
        state.traffic.push(Delivery {
            from,
            to,
            payload: payload.to_string(),
        });
        state.push(
            receiver,
            TransportEvent::LinkData {
                link: peer,
                payload: payload.to_string(),
            },
        );
        Ok(())
    }

    fn close_link(&mut self, link: LinkHandle) {
        let mut state = self.network.lock();
        if state.links.get(&link).is_some_and(|end| end.owner == self.id) {
            state.close(link);
        }
    }

    fn negotiation_state(&self, link: LinkHandle) -> NegotiationState {
        self.network
            .lock()
            .links
            .get(&link)
            .map(|end| end.state)
            .unwrap_or(NegotiationState::Closed)
    }

    fn call(&mut self, remote: &str, kind: MediaKind) -> Result<CallHandle, TransportError> {
        let mut state = self.network.lock();
        let local = state.address_of(self.id).ok_or(TransportError::NoEndpoint)?;
        let remote_id = *state
            .addresses
            .get(remote)
            .ok_or_else(|| TransportError::EndpointUnavailable(remote.to_string()))?;
        let near = state.new_call();
        let far = state.new_call();
        state.calls.insert(
            near,
            CallEnd {
                owner: self.id,
                peer: far,
            },
        );
        state.calls.insert(
            far,
            CallEnd {
                owner: remote_id,
                peer: near,
            },
        );
        state.push(
            remote_id,
            TransportEvent::IncomingCall {
                call: far,
                remote: local,
                kind,
            },
        );
        Ok(near)
    }

    fn answer(&mut self, call: CallHandle) -> Result<(), TransportError> {
        let mut state = self.network.lock();
        let end = state
            .calls
            .get(&call)
            .filter(|end| end.owner == self.id)
            .ok_or(TransportError::UnknownCall(call))?;
        let peer = end.peer;
        let caller = state.calls.get(&peer).map(|e| e.owner);
        state.push(self.id, TransportEvent::CallStream { call });
        if let Some(caller) = caller {
            state.push(caller, TransportEvent::CallStream { call: peer });
        }
        Ok(())
    }

    fn hang_up(&mut self, call: CallHandle) {
        let mut state = self.network.lock();
        if state.calls.get(&call).is_some_and(|end| end.owner == self.id) {
            state.hang_up(call);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registered(network: &MemoryNetwork, address: &str) -> MemoryTransport {
        let mut t = network.transport();
        t.open_endpoint(address, &[]).unwrap();
        t.poll_events();
        t
    }

    #[test]
    fn test_open_endpoint_reports_ready() {
        let network = MemoryNetwork::new();
        let mut t = network.transport();
        t.open_endpoint("HOST1", &[]).unwrap();
        assert_eq!(
            t.poll_events(),
            vec![TransportEvent::EndpointReady {
                address: "HOST1".into()
            }]
        );
        assert!(network.is_registered("HOST1"));
    }

    #[test]
    fn test_taken_address_fails_asynchronously() {
        let network = MemoryNetwork::new();
        let _first = registered(&network, "HOST1");
        let mut second = network.transport();
        second.open_endpoint("HOST1", &[]).unwrap();
        assert!(matches!(
            second.poll_events().as_slice(),
            [TransportEvent::EndpointFailed { .. }]
        ));
    }

    #[test]
    fn test_connect_and_exchange_frames() {
        // Arrange
        let network = MemoryNetwork::new();
        let host = registered(&network, "HOST1");
        let mut joiner = registered(&network, "joiner");

        // Act
        let link = joiner.connect("HOST1").unwrap();
        joiner.send(link, "hello").unwrap();

        // Assert
        let host_events = host.poll_events();
        assert!(matches!(
            host_events.as_slice(),
            [
                TransportEvent::InboundLink { .. },
                TransportEvent::LinkOpen { .. },
                TransportEvent::LinkData { .. }
            ]
        ));
        assert_eq!(network.payloads_to("HOST1"), vec!["hello".to_string()]);
        assert_eq!(network.connect_attempts_to("HOST1"), 1);
    }

    #[test]
    fn test_unknown_address_is_peer_unavailable() {
        let network = MemoryNetwork::new();
        let mut joiner = registered(&network, "joiner");
        let link = joiner.connect("NOPE1").unwrap();
        assert_eq!(
            joiner.poll_events(),
            vec![TransportEvent::LinkError {
                link,
                failure: LinkFailure::PeerUnavailable
            }]
        );
    }

    #[test]
    fn test_close_notifies_other_end_only() {
        // Arrange
        let network = MemoryNetwork::new();
        let host = registered(&network, "HOST1");
        let mut joiner = registered(&network, "joiner");
        let link = joiner.connect("HOST1").unwrap();
        host.poll_events();
        joiner.poll_events();

        // Act
        joiner.close_link(link);

        // Assert
        assert!(joiner.poll_events().is_empty());
        assert!(matches!(
            host.poll_events().as_slice(),
            [TransportEvent::LinkClosed { .. }]
        ));
        assert_eq!(joiner.send(link, "late"), Err(TransportError::UnknownLink(link)));
    }

    #[test]
    fn test_manual_open_keeps_link_negotiating() {
        // Arrange
        let network = MemoryNetwork::new();
        network.set_auto_open(false);
        let host = registered(&network, "HOST1");
        let mut joiner = registered(&network, "joiner");

        // Act
        let link = joiner.connect("HOST1").unwrap();

        // Assert
        assert_eq!(joiner.negotiation_state(link), NegotiationState::Checking);
        assert_eq!(joiner.send(link, "x"), Err(TransportError::LinkClosed(link)));
        assert!(network.open_link(link));
        assert_eq!(joiner.poll_events(), vec![TransportEvent::LinkOpen { link }]);
        assert_eq!(host.poll_events().len(), 2);
    }

    #[test]
    fn test_calls_stream_after_answer_and_close_on_hang_up() {
        // Arrange
        let network = MemoryNetwork::new();
        let mut host = registered(&network, "HOST1");
        let mut joiner = registered(&network, "joiner");
        let near = host.call("joiner", MediaKind::Screen).unwrap();
        let far = match joiner.poll_events().as_slice() {
            [TransportEvent::IncomingCall { call, .. }] => *call,
            other => panic!("unexpected {other:?}"),
        };

        // Act
        joiner.answer(far).unwrap();
        host.hang_up(near);

        // Assert
        assert_eq!(
            joiner.poll_events(),
            vec![
                TransportEvent::CallStream { call: far },
                TransportEvent::CallClosed { call: far }
            ]
        );
        assert_eq!(host.poll_events(), vec![TransportEvent::CallStream { call: near }]);
    }
}
