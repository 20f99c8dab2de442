//! Optional hooks around the shared chart state.

pub mod listeners;

pub use listeners::{SnapshotContext, SnapshotEvent, SnapshotListener};
