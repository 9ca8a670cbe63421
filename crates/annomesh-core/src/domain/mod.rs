//! Domain entities for annomesh.
//!
//! Pure data and rules with no transport, clock, or UI dependencies:
//!
//! - **`coords`** – pixel space ↔ unit space mapping.
//! - **`element`** – annotation elements, partial patches, group geometry.
//! - **`history`** – the local ordered history with its undo/redo cursor.
//! - **`share_code`** – the 5-character code joiners type to find a host.
//! - **`selection`** – the ephemeral local selection.

pub mod coords;
pub mod element;
pub mod history;
pub mod selection;
pub mod share_code;
