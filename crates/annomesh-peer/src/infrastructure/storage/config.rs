//! TOML-based configuration persistence for annomesh.
//!
//! Reads and writes `AppConfig` to the platform-appropriate config file:
//! - Windows:  `%APPDATA%\Annomesh\config.toml`
//! - Linux:    `~/.config/annomesh/config.toml`
//! - macOS:    `~/Library/Application Support/Annomesh/config.toml`
//!
//! Example:
//!
//! ```toml
//! [session]
//! log_level = "debug"
//! auto_reconnect = true
//!
//! [connection]
//! max_retries = 5
//! connect_timeout_ms = 20000
//!
//! [canvas]
//! mode = "infinite"
//!
//! [[ice_servers]]
//! urls = "turn:turn.example.org:3478"
//! username = "annomesh"
//! credential = "secret"
//! ```
//!
//! # Serde default values
//!
//! Every field carries `#[serde(default = "...")]`, so a missing file, a
//! missing section, or a missing key all fall back to the built-in value.
//! Older files keep loading when new settings are added.

use std::path::PathBuf;
use std::time::Duration;

use annomesh_core::{CanvasSpace, CoordinateError, Frame};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::context::{ConnectionPolicy, RacePolicy, SessionConfig};
use crate::application::transport::IceServer;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// The canvas reference dimensions are unusable.
    #[error("invalid canvas settings: {0}")]
    Canvas(#[from] CoordinateError),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level application configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub session: SessionSettings,
    #[serde(default)]
    pub connection: ConnectionSettings,
    #[serde(default)]
    pub race: RaceSettings,
    #[serde(default)]
    pub canvas: CanvasSettings,
    #[serde(default = "default_ice_servers")]
    pub ice_servers: Vec<IceServer>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionSettings {
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Joiners re-dial the host after an unexpected disconnect.
    #[serde(default = "default_true")]
    pub auto_reconnect: bool,
}

/// Joiner-side connect and retry timing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectionSettings {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_unavailable_notice_delay_ms")]
    pub unavailable_notice_delay_ms: u64,
}

/// Host-side handling of duplicate inbound links.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RaceSettings {
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,
    #[serde(default = "default_max_replacements")]
    pub max_replacements: u32,
    #[serde(default = "default_replacement_window_ms")]
    pub replacement_window_ms: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CanvasMode {
    /// Coordinates relative to each peer's visible canvas.
    #[default]
    Viewport,
    /// Coordinates relative to a fixed reference frame shared by all peers.
    Infinite,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CanvasSettings {
    #[serde(default)]
    pub mode: CanvasMode,
    #[serde(default = "default_reference_width")]
    pub reference_width: f64,
    #[serde(default = "default_reference_height")]
    pub reference_height: f64,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_delay_ms() -> u64 {
    2000
}
fn default_connect_timeout_ms() -> u64 {
    15_000
}
fn default_unavailable_notice_delay_ms() -> u64 {
    1500
}
fn default_grace_period_ms() -> u64 {
    8000
}
fn default_max_replacements() -> u32 {
    3
}
fn default_replacement_window_ms() -> u64 {
    30_000
}
fn default_reference_width() -> f64 {
    1920.0
}
fn default_reference_height() -> f64 {
    1080.0
}
fn default_ice_servers() -> Vec<IceServer> {
    vec![IceServer {
        urls: "stun:stun.l.google.com:19302".to_string(),
        username: None,
        credential: None,
    }]
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            session: SessionSettings::default(),
            connection: ConnectionSettings::default(),
            race: RaceSettings::default(),
            canvas: CanvasSettings::default(),
            ice_servers: default_ice_servers(),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            auto_reconnect: default_true(),
        }
    }
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            unavailable_notice_delay_ms: default_unavailable_notice_delay_ms(),
        }
    }
}

impl Default for RaceSettings {
    fn default() -> Self {
        Self {
            grace_period_ms: default_grace_period_ms(),
            max_replacements: default_max_replacements(),
            replacement_window_ms: default_replacement_window_ms(),
        }
    }
}

impl Default for CanvasSettings {
    fn default() -> Self {
        Self {
            mode: CanvasMode::default(),
            reference_width: default_reference_width(),
            reference_height: default_reference_height(),
        }
    }
}

impl AppConfig {
    /// Builds the engine configuration from the on-disk settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Canvas`] if the reference dimensions are not
    /// positive and finite.
    pub fn session_config(&self) -> Result<SessionConfig, ConfigError> {
        let frame = Frame::new(self.canvas.reference_width, self.canvas.reference_height)?;
        let canvas = match self.canvas.mode {
            CanvasMode::Viewport => CanvasSpace::Viewport(frame),
            CanvasMode::Infinite => CanvasSpace::Infinite(frame),
        };
        Ok(SessionConfig {
            connection: ConnectionPolicy {
                max_retries: self.connection.max_retries,
                retry_delay: Duration::from_millis(self.connection.retry_delay_ms),
                connect_timeout: Duration::from_millis(self.connection.connect_timeout_ms),
                unavailable_notice_delay: Duration::from_millis(
                    self.connection.unavailable_notice_delay_ms,
                ),
            },
            race: RacePolicy {
                grace_period: Duration::from_millis(self.race.grace_period_ms),
                max_replacements: self.race.max_replacements,
                replacement_window: Duration::from_millis(self.race.replacement_window_ms),
            },
            canvas,
            ice_servers: self.ice_servers.clone(),
            auto_reconnect: self.session.auto_reconnect,
        })
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads `AppConfig` from the default location, returning
/// `AppConfig::default()` if the file does not yet exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from(config_file_path()?)
}

/// Loads `AppConfig` from `path`; a missing file yields the defaults.
///
/// # Errors
///
/// Same as [`load_config`].
pub fn load_config_from(path: PathBuf) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(&path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(e) => Err(ConfigError::Io { path, source: e }),
    }
}

/// Persists `config` to the default location.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config(config: &AppConfig) -> Result<(), ConfigError> {
    save_config_to(config, config_file_path()?)
}

/// Persists `config` to `path`, creating parent directories.
///
/// # Errors
///
/// Same as [`save_config`].
pub fn save_config_to(config: &AppConfig, path: PathBuf) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(&path, content).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    Ok(())
}

/// Resolves the platform config base directory including the app subdirectory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("Annomesh"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("annomesh"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("Annomesh")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
