//! Storage infrastructure: configuration file persistence.
//!
//! The `config` sub-module reads and writes the TOML settings file from the
//! platform-appropriate directory, falls back to defaults on first run, and
//! converts the on-disk settings into the engine's `SessionConfig`.

pub mod config;
