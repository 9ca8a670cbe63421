//! Infrastructure layer for the peer engine.
//!
//! Contains the adapters around the application layer: the in-memory
//! transport and simulation harness, and file-system storage for settings.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `annomesh_core`, but MUST NOT be imported by the `application` layer.

pub mod memory;
pub mod simulation;
pub mod storage;
