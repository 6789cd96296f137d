//! Background Tasks Module
//!
//! Contains background tasks that run for the lifetime of the server.
//!
//! # Tasks
//! - TTL Sweep: Removes idle cache entries at configured intervals
//! - File Watch Invalidator: Evicts entries whose file changed on disk

mod invalidator;
mod sweep;

pub use invalidator::{spawn_invalidator, FileWatchInvalidator};
pub use sweep::spawn_sweep_task;
