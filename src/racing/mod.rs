//! Racing module: the rider against a field of ghosts.
//!
//! Provides the per-tick race loop and trainer resistance syncing.

pub mod race;
pub mod sync;

// Re-export commonly used types
pub use race::{GhostSnapshot, PowerHoldPolicy, Race, RaceEvent, RaceSnapshot, RiderSnapshot};
pub use sync::{ResistanceSync, ResistanceThresholds};
