//! Integration tests for connection establishment, retries, and recovery.
//!
//! # Purpose
//!
//! These tests run real session controllers over the in-memory network with
//! faults injected, and walk the virtual clock forward so connect timeouts
//! and retry delays fire exactly as they would in real time.  They verify:
//!
//! - The joiner retry ceiling (one attempt plus three retries).
//! - The free extra attempt and delayed notice for a host that is not
//!   online yet.
//! - The host's resolution of duplicate inbound links from one joiner
//!   (grace period, replacement, replacement limit).
//! - Joiner auto-reconnect after a dropped link, and the terminal failure
//!   when the host is gone for good.
//!
//! # Default timing
//!
//! ```text
//! attempt 1 ──15 s timeout──► wait 2 s ──► attempt 2 ──15 s──► ... attempt 4 ──15 s──► fail
//! ```

use std::time::Duration;

use annomesh_core::{Point, Style, Tool};
use annomesh_peer::application::context::SessionConfig;
use annomesh_peer::application::error::{FailureCause, SessionError};
use annomesh_peer::application::events::{SessionEvent, SessionState};
use annomesh_peer::application::transport::{LinkFailure, Transport, TransportEvent};
use annomesh_peer::infrastructure::memory::MemoryTransport;
use annomesh_peer::infrastructure::simulation::Simulation;

// ── Helpers ───────────────────────────────────────────────────────────────────

fn host(sim: &mut Simulation) -> String {
    let code = sim
        .add_peer("host", SessionConfig::default(), 3)
        .start_hosting()
        .expect("host starts")
        .to_string();
    sim.run_until_idle();
    code
}

fn join(sim: &mut Simulation, name: &str, code: &str, config: SessionConfig) {
    sim.add_peer(name, config, 9)
        .join_with_code(code)
        .expect("join");
    sim.run_until_idle();
}

fn failure(sim: &Simulation, name: &str) -> Option<SessionError> {
    sim.events(name).iter().find_map(|e| match e {
        SessionEvent::Failed { error, .. } => Some(error.clone()),
        _ => None,
    })
}

/// A bare endpoint that dials the host by hand, bypassing any session logic.
fn raw_endpoint(sim: &Simulation, address: &str) -> MemoryTransport {
    let mut raw = sim.network().transport();
    raw.open_endpoint(address, &[]).expect("endpoint opens");
    raw.poll_events();
    raw
}

fn closed_links(raw: &MemoryTransport) -> Vec<u64> {
    raw.poll_events()
        .into_iter()
        .filter_map(|e| match e {
            TransportEvent::LinkClosed { link } => Some(link.0),
            _ => None,
        })
        .collect()
}

// ── Retry ceiling ─────────────────────────────────────────────────────────────

#[test]
fn test_unresponsive_host_fails_after_four_attempts() {
    // Arrange
    let mut sim = Simulation::new();
    let code = host(&mut sim);
    sim.network().set_unresponsive(&code, true);

    // Act
    join(&mut sim, "joiner", &code, SessionConfig::default());
    sim.advance(Duration::from_secs(70));

    // Assert
    assert_eq!(sim.network().connect_attempts_to(&code), 4);
    assert_eq!(
        failure(&sim, "joiner"),
        Some(SessionError::ConnectionFailed {
            target: code,
            attempts: 4,
            cause: FailureCause::Timeout,
        })
    );
    assert_eq!(sim.peer("joiner").unwrap().state(), SessionState::Idle);
}

#[test]
fn test_no_retry_before_timeout_elapses() {
    // Arrange
    let mut sim = Simulation::new();
    let code = host(&mut sim);
    sim.network().set_unresponsive(&code, true);
    join(&mut sim, "joiner", &code, SessionConfig::default());

    // Act: just short of timeout plus retry delay
    sim.advance(Duration::from_millis(16_900));

    // Assert
    assert_eq!(sim.network().connect_attempts_to(&code), 1);
    assert!(failure(&sim, "joiner").is_none());
}

#[test]
fn test_ice_failure_is_retried_then_succeeds() {
    // Arrange
    let mut sim = Simulation::new();
    let code = host(&mut sim);
    sim.network()
        .fail_next_connects(&code, LinkFailure::IceFailed, 2);

    // Act
    join(&mut sim, "joiner", &code, SessionConfig::default());
    sim.advance(Duration::from_secs(5));

    // Assert
    assert_eq!(sim.network().connect_attempts_to(&code), 3);
    assert_eq!(sim.peer("joiner").unwrap().state(), SessionState::Active);
    assert!(failure(&sim, "joiner").is_none());
}

#[test]
fn test_extreme_policy_values_do_not_overflow() {
    // Arrange: values as large as a config file can express
    let mut sim = Simulation::new();
    let code = host(&mut sim);
    sim.network().set_unresponsive(&code, true);
    let mut config = SessionConfig::default();
    config.connection.max_retries = u32::MAX;
    config.connection.connect_timeout = Duration::MAX;
    config.connection.retry_delay = Duration::MAX;

    // Act
    join(&mut sim, "joiner", &code, config);
    sim.advance(Duration::from_secs(60));

    // Assert: still waiting on the first attempt
    assert_eq!(sim.network().connect_attempts_to(&code), 1);
    assert!(failure(&sim, "joiner").is_none());
    assert!(sim.peer("joiner").unwrap().next_deadline().is_some());
}

// ── Host not online yet ───────────────────────────────────────────────────────

#[test]
fn test_unavailable_host_gets_free_attempt_and_notice() {
    // Arrange
    let mut sim = Simulation::new();
    let code = host(&mut sim);
    sim.network()
        .fail_next_connects(&code, LinkFailure::PeerUnavailable, 1);

    // Act
    join(&mut sim, "joiner", &code, SessionConfig::default());
    sim.advance(Duration::from_secs(3));

    // Assert
    assert_eq!(sim.peer("joiner").unwrap().state(), SessionState::Active);
    assert!(sim
        .events("joiner")
        .iter()
        .any(|e| matches!(e, SessionEvent::Notice(_))));
}

#[test]
fn test_missing_host_fails_after_budget_plus_free_attempt() {
    // Arrange: a well-formed code nobody hosts
    let mut sim = Simulation::new();

    // Act
    join(&mut sim, "joiner", "QWERT", SessionConfig::default());
    sim.advance(Duration::from_secs(10));

    // Assert
    assert_eq!(sim.network().connect_attempts_to("QWERT"), 5);
    assert_eq!(
        failure(&sim, "joiner"),
        Some(SessionError::ConnectionFailed {
            target: "QWERT".into(),
            attempts: 5,
            cause: FailureCause::PeerUnavailable,
        })
    );
}

#[test]
fn test_quick_recovery_shows_no_notice() {
    // Arrange: custom policy with a notice delay longer than the retry delay
    let mut sim = Simulation::new();
    let code = host(&mut sim);
    sim.network()
        .fail_next_connects(&code, LinkFailure::PeerUnavailable, 1);
    let mut config = SessionConfig::default();
    config.connection.retry_delay = Duration::from_millis(500);

    // Act
    join(&mut sim, "joiner", &code, config);
    sim.advance(Duration::from_secs(3));

    // Assert
    assert_eq!(sim.peer("joiner").unwrap().state(), SessionState::Active);
    assert!(!sim
        .events("joiner")
        .iter()
        .any(|e| matches!(e, SessionEvent::Notice(_))));
}

// ── Duplicate inbound links ───────────────────────────────────────────────────

#[test]
fn test_duplicate_within_grace_period_is_rejected() {
    // Arrange
    let mut sim = Simulation::new();
    let code = host(&mut sim);
    sim.network().set_auto_open(false);
    let mut raw = raw_endpoint(&sim, "dup-peer");
    let first = raw.connect(&code).unwrap();
    sim.run_until_idle();

    // Act: a second link two seconds later
    sim.advance(Duration::from_secs(2));
    let second = raw.connect(&code).unwrap();
    sim.run_until_idle();

    // Assert: the newcomer is closed, the first survives
    assert_eq!(closed_links(&raw), vec![second.0]);
    assert!(sim.network().open_link(first));
    sim.run_until_idle();
    assert_eq!(
        sim.peer("host").unwrap().connected_peers(),
        vec!["dup-peer".to_string()]
    );
}

#[test]
fn test_stale_pending_link_is_replaced() {
    // Arrange
    let mut sim = Simulation::new();
    let code = host(&mut sim);
    sim.network().set_auto_open(false);
    let mut raw = raw_endpoint(&sim, "dup-peer");
    let first = raw.connect(&code).unwrap();
    sim.run_until_idle();

    // Act: past the grace period
    sim.advance(Duration::from_secs(9));
    let second = raw.connect(&code).unwrap();
    sim.run_until_idle();

    // Assert: the old link is torn down and the new one can open
    assert_eq!(closed_links(&raw), vec![first.0]);
    assert!(sim.network().open_link(second));
    sim.run_until_idle();
    assert_eq!(sim.peer("host").unwrap().state(), SessionState::Active);
}

#[test]
fn test_replacements_stop_at_limit() {
    // Arrange
    let mut sim = Simulation::new();
    let code = host(&mut sim);
    sim.network().set_auto_open(false);
    let mut raw = raw_endpoint(&sim, "dup-peer");
    let mut latest = raw.connect(&code).unwrap();
    sim.run_until_idle();

    // Act: three replacements are allowed
    for _ in 0..3 {
        sim.advance(Duration::from_secs(9));
        let next = raw.connect(&code).unwrap();
        sim.run_until_idle();
        assert_eq!(closed_links(&raw), vec![latest.0]);
        latest = next;
    }
    sim.advance(Duration::from_secs(9));
    let refused = raw.connect(&code).unwrap();
    sim.run_until_idle();

    // Assert: the fourth is refused and the last accepted link stays
    assert_eq!(closed_links(&raw), vec![refused.0]);
    assert!(sim.network().open_link(latest));
    sim.run_until_idle();
    assert_eq!(
        sim.peer("host").unwrap().connected_peers(),
        vec!["dup-peer".to_string()]
    );
}

#[test]
fn test_second_link_to_open_peer_is_rejected() {
    // Arrange
    let mut sim = Simulation::new();
    let code = host(&mut sim);
    let mut raw = raw_endpoint(&sim, "dup-peer");
    raw.connect(&code).unwrap();
    sim.run_until_idle();
    raw.poll_events();

    // Act
    let extra = raw.connect(&code).unwrap();
    sim.run_until_idle();

    // Assert
    assert!(closed_links(&raw).contains(&extra.0));
    assert_eq!(sim.peer("host").unwrap().connected_peers().len(), 1);
}

// ── Recovery ──────────────────────────────────────────────────────────────────

#[test]
fn test_joiner_reconnects_after_link_drop() {
    // Arrange
    let mut sim = Simulation::new();
    let code = host(&mut sim);
    join(&mut sim, "joiner", &code, SessionConfig::default());
    sim.take_events("joiner");

    // Act
    sim.network().disconnect(&code);
    sim.run_until_idle();

    // Assert
    let events = sim.take_events("joiner");
    assert!(events.contains(&SessionEvent::PeerLeft(code.clone())));
    assert!(events.iter().any(|e| matches!(e, SessionEvent::Notice(_))));
    assert!(events.contains(&SessionEvent::PeerJoined(code.clone())));
    assert_eq!(sim.peer("joiner").unwrap().state(), SessionState::Active);
    assert_eq!(sim.peer("host").unwrap().state(), SessionState::Active);
    assert_eq!(sim.network().connect_attempts_to(&code), 2);
}

#[test]
fn test_reconnect_restores_canvas_through_full_sync() {
    // Arrange
    let mut sim = Simulation::new();
    let code = host(&mut sim);
    join(&mut sim, "joiner", &code, SessionConfig::default());
    let host_peer = sim.peer_mut("host").unwrap();
    let id = host_peer.begin_element(Tool::Rect, Style::default(), Point::new(5.0, 5.0));
    host_peer.end_element(&id);
    sim.run_until_idle();

    // Act
    sim.network().disconnect(&code);
    sim.run_until_idle();

    // Assert
    assert!(sim.peer("joiner").unwrap().replicator().contains(&id));
    assert!(sim.converged());
}

#[test]
fn test_host_gone_for_good_reports_host_lost() {
    // Arrange
    let mut sim = Simulation::new();
    let code = host(&mut sim);
    join(&mut sim, "joiner", &code, SessionConfig::default());

    // Act
    sim.peer_mut("host").unwrap().stop();
    sim.advance(Duration::from_secs(15));

    // Assert
    assert_eq!(
        failure(&sim, "joiner"),
        Some(SessionError::HostLost {
            target: code,
            attempts: 5,
            cause: FailureCause::PeerUnavailable,
        })
    );
    assert_eq!(sim.peer("joiner").unwrap().state(), SessionState::Idle);
}

#[test]
fn test_without_auto_reconnect_link_drop_is_terminal() {
    // Arrange
    let mut sim = Simulation::new();
    let code = host(&mut sim);
    let config = SessionConfig {
        auto_reconnect: false,
        ..SessionConfig::default()
    };
    join(&mut sim, "joiner", &code, config);

    // Act
    sim.network().disconnect(&code);
    sim.run_until_idle();

    // Assert
    assert_eq!(
        failure(&sim, "joiner"),
        Some(SessionError::HostLost {
            target: code.clone(),
            attempts: 0,
            cause: FailureCause::Closed,
        })
    );
    assert_eq!(sim.network().connect_attempts_to(&code), 1);
}
