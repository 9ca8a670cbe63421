//! Per-session settings handed to every component at construction.
//!
//! Nothing in the engine reads process-wide state: two
//! [`SessionController`](crate::application::session::SessionController)s
//! built from two different `SessionConfig`s can run side by side in one
//! process, which is exactly what the simulation harness does.
//!
//! # Defaults
//!
//! | Setting                     | Default  |
//! |-----------------------------|----------|
//! | `max_retries`               | 3        |
//! | `retry_delay`               | 2 s      |
//! | `connect_timeout`           | 15 s     |
//! | `unavailable_notice_delay`  | 1.5 s    |
//! | `grace_period`              | 8 s      |
//! | `max_replacements`          | 3        |
//! | `replacement_window`        | 30 s     |
//! | `auto_reconnect`            | on       |

use std::time::Duration;

use annomesh_core::CanvasSpace;

use super::transport::IceServer;

/// Joiner-side connect/retry parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionPolicy {
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub connect_timeout: Duration,
    /// How long a "host not found" condition must persist before the user
    /// is told about it.
    pub unavailable_notice_delay: Duration,
}

impl Default for ConnectionPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_millis(2000),
            connect_timeout: Duration::from_millis(15_000),
            unavailable_notice_delay: Duration::from_millis(1500),
        }
    }
}

/// Host-side resolution of duplicate inbound links from one peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RacePolicy {
    /// A negotiating link younger than this is never torn down.
    pub grace_period: Duration,
    pub max_replacements: u32,
    /// Quiet time after which the replacement counter starts over.
    pub replacement_window: Duration,
}

impl Default for RacePolicy {
    fn default() -> Self {
        Self {
            grace_period: Duration::from_millis(8000),
            max_replacements: 3,
            replacement_window: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub connection: ConnectionPolicy,
    pub race: RacePolicy,
    pub canvas: CanvasSpace,
    pub ice_servers: Vec<IceServer>,
    /// Joiners re-dial the host when an open link drops.
    pub auto_reconnect: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionPolicy::default(),
            race: RacePolicy::default(),
            canvas: CanvasSpace::default(),
            ice_servers: Vec::new(),
            auto_reconnect: true,
        }
    }
}
