//! Deterministic multi-peer simulation over a [`MemoryNetwork`].
//!
//! The simulation owns a set of named session controllers and a virtual
//! clock.  [`run_until_idle`](Simulation::run_until_idle) pumps transport
//! events until nothing moves; [`advance`](Simulation::advance) walks the
//! clock forward deadline by deadline so connect timeouts and retries fire
//! in order without real waiting.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::memory::{MemoryNetwork, MemoryTransport};
use crate::application::context::SessionConfig;
use crate::application::events::SessionEvent;
use crate::application::session::SessionController;

/// Upper bound on pump rounds in one [`Simulation::run_until_idle`] call.
const MAX_ROUNDS: usize = 10_000;

pub type SimPeer = SessionController<MemoryTransport>;

/// A world of peers sharing one in-memory network.
pub struct Simulation {
    network: MemoryNetwork,
    peers: BTreeMap<String, SimPeer>,
    events: BTreeMap<String, Vec<SessionEvent>>,
    now: Instant,
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new()
    }
}

impl Simulation {
    /// Create an empty simulation starting at the current instant.
    pub fn new() -> Self {
        Self {
            network: MemoryNetwork::new(),
            peers: BTreeMap::new(),
            events: BTreeMap::new(),
            now: Instant::now(),
        }
    }

    pub fn network(&self) -> &MemoryNetwork {
        &self.network
    }

    pub fn now(&self) -> Instant {
        self.now
    }

    /// Add a peer.  `seed` makes its share codes reproducible.
    pub fn add_peer(&mut self, name: &str, config: SessionConfig, seed: u64) -> &mut SimPeer {
        let controller = SessionController::with_seed(self.network.transport(), config, seed);
        self.events.insert(name.to_string(), Vec::new());
        self.peers.entry(name.to_string()).or_insert(controller)
    }

    /// Get a peer by name.
    pub fn peer(&self, name: &str) -> Option<&SimPeer> {
        self.peers.get(name)
    }

    /// Get a mutable peer by name.
    pub fn peer_mut(&mut self, name: &str) -> Option<&mut SimPeer> {
        self.peers.get_mut(name)
    }

    pub fn peer_names(&self) -> Vec<String> {
        self.peers.keys().cloned().collect()
    }

    /// Every event `name` emitted so far.
    pub fn events(&self, name: &str) -> &[SessionEvent] {
        self.events.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn take_events(&mut self, name: &str) -> Vec<SessionEvent> {
        self.events
            .get_mut(name)
            .map(std::mem::take)
            .unwrap_or_default()
    }

    /// Deliver queued transport events until no endpoint has any left.
    ///
    /// Returns the number of events delivered.
    pub fn run_until_idle(&mut self) -> usize {
        let now = self.now;
        let mut delivered = 0;
        for round in 0.. {
            if round == MAX_ROUNDS {
                warn!(delivered, "simulation did not settle");
                break;
            }
            let mut moved = false;
            for peer in self.peers.values_mut() {
                for event in peer.transport().poll_events() {
                    peer.handle_transport_event(event, now);
                    delivered += 1;
                    moved = true;
                }
            }
            if !moved {
                break;
            }
        }
        self.collect_events();
        delivered
    }

    /// Move the clock forward by `by`, firing every timer that falls due on
    /// the way.
    pub fn advance(&mut self, by: Duration) {
        let target = self.now + by;
        loop {
            self.run_until_idle();
            let next = self
                .peers
                .values()
                .filter_map(SimPeer::next_deadline)
                .filter(|deadline| *deadline <= target)
                .min();
            let Some(deadline) = next else {
                break;
            };
            self.now = self.now.max(deadline);
            debug!(elapsed = ?self.now.saturating_duration_since(target - by), "timers due");
            self.fire_timers();
        }
        self.now = target;
        self.fire_timers();
        self.run_until_idle();
    }

    fn fire_timers(&mut self) {
        let now = self.now;
        for peer in self.peers.values_mut() {
            peer.poll_timers(now);
        }
    }

    fn collect_events(&mut self) {
        for (name, peer) in self.peers.iter_mut() {
            let drained = peer.take_events();
            if !drained.is_empty() {
                self.events.entry(name.clone()).or_default().extend(drained);
            }
        }
    }

    /// Advance the virtual clock in `tick` steps, pacing each step against
    /// the tokio clock, for `duration` of simulated time.
    pub async fn run_paced(&mut self, duration: Duration, tick: Duration) {
        let mut interval = tokio::time::interval(tick);
        let mut elapsed = Duration::ZERO;
        while elapsed < duration {
            interval.tick().await;
            self.advance(tick);
            elapsed += tick;
        }
    }

    /// Whether every peer sees the same set of element ids.
    pub fn converged(&self) -> bool {
        let mut views = self.peers.values().map(element_ids);
        let Some(first) = views.next() else {
            return true;
        };
        views.all(|ids| ids == first)
    }
}

fn element_ids(peer: &SimPeer) -> Vec<String> {
    let mut ids: Vec<_> = peer
        .replicator()
        .all_elements()
        .into_iter()
        .map(|e| e.id)
        .collect();
    ids.sort();
    ids
}
