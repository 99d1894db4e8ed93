//! Show/suppress gate policies
//!
//! Before an opportunity reaches the auction, a gate policy decides
//! whether to show an ad at all. The gate is the platform's pacing
//! lever: it trades short-term fill volume against audience fatigue.
//!
//! # Policy Interface
//!
//! All policies implement the [`GatePolicy`] trait:
//!
//! ```rust
//! use auction_sim_core_rs::policy::GatePolicy;
//!
//! #[derive(Debug)]
//! struct AlwaysShow;
//!
//! impl GatePolicy for AlwaysShow {
//!     fn show_probability(&self, _fatigue: f64, _tolerance: f64) -> f64 {
//!         1.0
//!     }
//! }
//! ```
//!
//! # Available Policies
//!
//! 1. **Fixed**: constant show probability, ignores session state
//! 2. **Adaptive**: logistic backoff as fatigue approaches and passes
//!    the session's tolerance
//!
//! Policies are selected through [`PolicyKind`] in the parameter set and
//! built via [`build_policy`]; swapping policies mid-run takes effect on
//! the next opportunity.

use crate::config::PolicyKind;

/// Decides the probability of showing an ad for one opportunity
///
/// Implementations must be pure functions of their arguments: the gate
/// is consulted once per opportunity and any randomness belongs to the
/// caller's stream, not the policy.
pub trait GatePolicy: std::fmt::Debug {
    /// Probability in [0, 1] of letting this opportunity through
    ///
    /// # Arguments
    /// * `fatigue` - The session's current fatigue level
    /// * `tolerance` - The session's sampled fatigue tolerance
    fn show_probability(&self, fatigue: f64, tolerance: f64) -> f64;
}

/// Constant-probability gate, the baseline policy
#[derive(Debug, Clone, Copy)]
pub struct FixedPolicy {
    show_rate: f64,
}

impl FixedPolicy {
    pub fn new(show_rate: f64) -> Self {
        Self {
            show_rate: show_rate.clamp(0.0, 1.0),
        }
    }
}

impl GatePolicy for FixedPolicy {
    fn show_probability(&self, _fatigue: f64, _tolerance: f64) -> f64 {
        self.show_rate
    }
}

/// Fatigue-aware gate with logistic backoff
///
/// show = base_show_rate · σ(−steepness · (fatigue − tolerance))
///
/// A rested session (fatigue far under tolerance) is shown at nearly
/// the base rate; at exactly tolerance the gate is at half the base
/// rate; past tolerance it closes exponentially fast in `steepness`.
#[derive(Debug, Clone, Copy)]
pub struct AdaptivePolicy {
    base_show_rate: f64,
    steepness: f64,
}

impl AdaptivePolicy {
    pub fn new(base_show_rate: f64, steepness: f64) -> Self {
        Self {
            base_show_rate: base_show_rate.clamp(0.0, 1.0),
            steepness: steepness.max(0.0),
        }
    }
}

impl GatePolicy for AdaptivePolicy {
    fn show_probability(&self, fatigue: f64, tolerance: f64) -> f64 {
        let overload = fatigue - tolerance;
        self.base_show_rate * logistic(-self.steepness * overload)
    }
}

/// Standard logistic function σ(x) = 1 / (1 + e^(−x))
fn logistic(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Build the gate policy selected by the parameter set
pub fn build_policy(kind: &PolicyKind) -> Box<dyn GatePolicy> {
    match *kind {
        PolicyKind::Fixed { show_rate } => Box::new(FixedPolicy::new(show_rate)),
        PolicyKind::Adaptive {
            base_show_rate,
            steepness,
        } => Box::new(AdaptivePolicy::new(base_show_rate, steepness)),
    }
}
