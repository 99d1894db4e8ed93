//! Auction Pressure Simulator - Rust Engine
//!
//! Deterministic discrete-time simulation of ad-auction pressure on a
//! population of user sessions.
//!
//! # Architecture
//!
//! - **core**: Fixed-step clock and frame driver
//! - **config**: Live-tunable parameter set with range clamping
//! - **models**: Domain types (Session, Bidder, outcomes, events)
//! - **sessions**: Spawn/advance/exit lifecycle of the session pool
//! - **auction**: Gate checks and second-price clearing
//! - **policy**: Show/suppress gate policies
//! - **metrics**: Per-second KPI aggregation and rolling history
//! - **orchestrator**: Main simulation loop
//! - **rng**: Deterministic random number generation
//! - **series**: Fixed-capacity ring buffers backing the history
//!
//! # Critical Invariants
//!
//! 1. All randomness is deterministic (seeded, labeled streams)
//! 2. Time advances on an integer microsecond grid
//! 3. FFI boundary is minimal and safe

// Module declarations
pub mod auction;
pub mod config;
pub mod core;
pub mod metrics;
pub mod models;
pub mod orchestrator;
pub mod policy;
pub mod rng;
pub mod series;
pub mod sessions;

// Re-exports for convenience
pub use auction::{clear_second_price, resolve_opportunity, Clearing};
pub use config::{PatchParseError, PolicyKind, SimParams, SimParamsPatch};
pub use core::time::{SimClock, StepDriver, MAX_DT_S};
pub use metrics::{
    Metrics, NoFillBreakdown, PriceReservoir, SecondSnapshot, SeriesSnapshot, TRAILING_WINDOW_S,
};
pub use models::{
    AuctionOutcome, Bidder, BidderPool, Event, EventLog, ExitKind, NoFillReason, Session,
    SessionView,
};
pub use orchestrator::{ListenerHandle, SimError, Simulation, TickReport};
pub use policy::{build_policy, AdaptivePolicy, FixedPolicy, GatePolicy};
pub use rng::RngStream;
pub use series::{RingSeries, HISTORY_CAPACITY};
pub use sessions::{AdvanceStats, SessionExit, SessionPool, SpawnReport};

// FFI module (when feature enabled)
#[cfg(feature = "pyo3")]
pub mod ffi;

// PyO3 exports (when feature enabled)
#[cfg(feature = "pyo3")]
use pyo3::prelude::*;

#[cfg(feature = "pyo3")]
#[pymodule]
fn auction_sim_core_rs(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<ffi::simulation::PySimulation>()?;
    Ok(())
}
