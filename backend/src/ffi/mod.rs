//! Python FFI layer
//!
//! Thin PyO3 wrappers over the Rust engine. All simulation logic lives
//! on the Rust side; this layer only converts types at the boundary.

pub mod simulation;
pub mod types;

pub use simulation::PySimulation;
