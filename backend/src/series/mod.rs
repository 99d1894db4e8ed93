//! Fixed-capacity rolling series storage
//!
//! Every per-second KPI stream keeps its recent history in a
//! [`RingSeries`] so chart-style consumers can read a bounded window
//! without the engine ever reallocating on the hot path.

mod ring;

pub use ring::RingSeries;

/// History window, in seconds, retained by every KPI series.
pub const HISTORY_CAPACITY: usize = 120;
