//! Orchestrator - top-level simulation facade
//!
//! Owns every subsystem (clock, RNG streams, session pool, bidder pool,
//! metrics) and drives them through the tick loop.
//!
//! See `engine.rs` for full implementation.

pub mod engine;

// Re-export main types for convenience
pub use engine::{ListenerHandle, SimError, Simulation, TickReport};
