//! Simulation parameter set, live-tunable via patches
//!
//! All knobs of the engine live in [`SimParams`]. A running simulation
//! accepts [`SimParamsPatch`] updates between ticks; every field is
//! clamped into its documented range on application, so out-of-range or
//! non-finite host input degrades to the nearest safe value instead of
//! corrupting the run.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error parsing a wire-format parameter patch
#[derive(Debug, Error)]
pub enum PatchParseError {
    #[error("malformed patch JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Gate policy selection
///
/// Determines how the show/suppress decision is made before an
/// opportunity reaches the auction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PolicyKind {
    /// Fixed: show every opportunity with the same probability
    Fixed {
        /// Probability of letting an opportunity through, [0, 1]
        show_rate: f64,
    },

    /// Adaptive: back off as session fatigue exceeds tolerance
    Adaptive {
        /// Show probability for a fully rested session, [0, 1]
        base_show_rate: f64,
        /// How sharply the gate closes once fatigue passes tolerance, [0, 20]
        steepness: f64,
    },
}

impl PolicyKind {
    /// Clamp the policy's own parameters into range
    fn clamped(self) -> Self {
        match self {
            PolicyKind::Fixed { show_rate } => PolicyKind::Fixed {
                show_rate: clamp_range(show_rate, 0.0, 1.0, 0.9),
            },
            PolicyKind::Adaptive {
                base_show_rate,
                steepness,
            } => PolicyKind::Adaptive {
                base_show_rate: clamp_range(base_show_rate, 0.0, 1.0, 0.9),
                steepness: clamp_range(steepness, 0.0, 20.0, 1.6),
            },
        }
    }
}

impl Default for PolicyKind {
    fn default() -> Self {
        PolicyKind::Adaptive {
            base_show_rate: 0.9,
            steepness: 1.6,
        }
    }
}

/// Complete simulation parameter set
///
/// # Example
/// ```
/// use auction_sim_core_rs::SimParams;
///
/// let params = SimParams::default();
/// assert_eq!(params.arrival_rate_per_s, 2.0);
/// assert_eq!(params.bidder_count, 6);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimParams {
    /// Mean session arrivals per second (Poisson), [0, 50]
    pub arrival_rate_per_s: f64,

    /// Hard cap on concurrently live sessions, [1, 500]
    pub max_live_sessions: usize,

    /// Mean of the exponential session lifetime draw (seconds), [1, 600]
    pub mean_session_lifetime_s: f64,

    /// Mean ad opportunities per live session per second (Poisson), [0, 20]
    pub opportunity_rate_per_s: f64,

    /// Mean of the per-session fatigue tolerance draw, [0.05, 10]
    pub tolerance_mean: f64,

    /// Standard deviation of the tolerance draw, [0, 5]
    pub tolerance_sd: f64,

    /// Fatigue units recovered per second of elapsed time, [0, 5]
    pub decay_per_s: f64,

    /// Fatigue units added by each fill, [0, 5]
    pub fill_increment: f64,

    /// How strongly fatigue overload raises the early-exit hazard, [0, 50]
    pub hazard_gain: f64,

    /// Click-through rate of a fully rested session, [0.0005, 1]
    pub base_ctr: f64,

    /// Exponential CTR decay rate per fatigue unit, [0, 10]
    pub ctr_penalty: f64,

    /// Exponential bid-quality decay rate per fatigue unit, [0, 10]
    pub quality_penalty: f64,

    /// Number of bidders in the pool, [1, 64]
    pub bidder_count: u32,

    /// Target arithmetic mean of base bidder values (log-normal), [0.01, 1000]
    pub bid_mean: f64,

    /// Log-space sigma of base bidder values, [0, 3]
    pub bid_sigma: f64,

    /// Reserve price; auctions clearing below it are rejected, [0, 1000]
    pub floor_price: f64,

    /// Platform's share of cleared spend, [0, 1]
    pub take_rate: f64,

    /// Lifetime fill cap per session; 0 disables fills entirely, [0, 10000]
    pub max_fills_per_session: u32,

    /// Minimum seconds between consecutive fills in one session, [0, 120]
    pub min_fill_gap_s: f64,

    /// Show/suppress gate policy
    pub policy: PolicyKind,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            arrival_rate_per_s: 2.0,        // sessions/s
            max_live_sessions: 60,
            mean_session_lifetime_s: 45.0,  // seconds
            opportunity_rate_per_s: 1.5,    // opportunities/session/s
            tolerance_mean: 1.2,
            tolerance_sd: 0.4,
            decay_per_s: 0.08,              // fatigue units/s
            fill_increment: 0.22,           // fatigue units/fill
            hazard_gain: 0.35,
            base_ctr: 0.045,                // 4.5% when rested
            ctr_penalty: 0.9,
            quality_penalty: 0.5,
            bidder_count: 6,
            bid_mean: 2.4,                  // currency units
            bid_sigma: 0.6,
            floor_price: 0.8,               // currency units
            take_rate: 0.3,                 // 30% platform share
            max_fills_per_session: 30,
            min_fill_gap_s: 2.0,            // seconds
            policy: PolicyKind::default(),
        }
    }
}

impl SimParams {
    /// Return a copy with every field forced into its documented range
    ///
    /// Non-finite values fall back to the field's default rather than
    /// propagating through the dynamics.
    pub fn clamped(&self) -> Self {
        let d = SimParams::default();
        Self {
            arrival_rate_per_s: clamp_range(self.arrival_rate_per_s, 0.0, 50.0, d.arrival_rate_per_s),
            max_live_sessions: self.max_live_sessions.clamp(1, 500),
            mean_session_lifetime_s: clamp_range(
                self.mean_session_lifetime_s,
                1.0,
                600.0,
                d.mean_session_lifetime_s,
            ),
            opportunity_rate_per_s: clamp_range(
                self.opportunity_rate_per_s,
                0.0,
                20.0,
                d.opportunity_rate_per_s,
            ),
            tolerance_mean: clamp_range(self.tolerance_mean, 0.05, 10.0, d.tolerance_mean),
            tolerance_sd: clamp_range(self.tolerance_sd, 0.0, 5.0, d.tolerance_sd),
            decay_per_s: clamp_range(self.decay_per_s, 0.0, 5.0, d.decay_per_s),
            fill_increment: clamp_range(self.fill_increment, 0.0, 5.0, d.fill_increment),
            hazard_gain: clamp_range(self.hazard_gain, 0.0, 50.0, d.hazard_gain),
            base_ctr: clamp_range(self.base_ctr, 0.0005, 1.0, d.base_ctr),
            ctr_penalty: clamp_range(self.ctr_penalty, 0.0, 10.0, d.ctr_penalty),
            quality_penalty: clamp_range(self.quality_penalty, 0.0, 10.0, d.quality_penalty),
            bidder_count: self.bidder_count.clamp(1, 64),
            bid_mean: clamp_range(self.bid_mean, 0.01, 1000.0, d.bid_mean),
            bid_sigma: clamp_range(self.bid_sigma, 0.0, 3.0, d.bid_sigma),
            floor_price: clamp_range(self.floor_price, 0.0, 1000.0, d.floor_price),
            take_rate: clamp_range(self.take_rate, 0.0, 1.0, d.take_rate),
            max_fills_per_session: self.max_fills_per_session.min(10_000),
            min_fill_gap_s: clamp_range(self.min_fill_gap_s, 0.0, 120.0, d.min_fill_gap_s),
            policy: self.policy.clamped(),
        }
    }

    /// Apply a patch, leaving unmentioned fields untouched, then clamp
    pub fn merged(&self, patch: &SimParamsPatch) -> Self {
        let mut next = self.clone();
        macro_rules! take {
            ($field:ident) => {
                if let Some(value) = patch.$field {
                    next.$field = value;
                }
            };
        }
        take!(arrival_rate_per_s);
        take!(max_live_sessions);
        take!(mean_session_lifetime_s);
        take!(opportunity_rate_per_s);
        take!(tolerance_mean);
        take!(tolerance_sd);
        take!(decay_per_s);
        take!(fill_increment);
        take!(hazard_gain);
        take!(base_ctr);
        take!(ctr_penalty);
        take!(quality_penalty);
        take!(bidder_count);
        take!(bid_mean);
        take!(bid_sigma);
        take!(floor_price);
        take!(take_rate);
        take!(max_fills_per_session);
        take!(min_fill_gap_s);
        take!(policy);
        next.clamped()
    }
}

/// Partial parameter update
///
/// Every field is optional; `None` means "keep the current value".
/// Unknown fields in the wire form are ignored, so older hosts can talk
/// to newer engines.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimParamsPatch {
    pub arrival_rate_per_s: Option<f64>,
    pub max_live_sessions: Option<usize>,
    pub mean_session_lifetime_s: Option<f64>,
    pub opportunity_rate_per_s: Option<f64>,
    pub tolerance_mean: Option<f64>,
    pub tolerance_sd: Option<f64>,
    pub decay_per_s: Option<f64>,
    pub fill_increment: Option<f64>,
    pub hazard_gain: Option<f64>,
    pub base_ctr: Option<f64>,
    pub ctr_penalty: Option<f64>,
    pub quality_penalty: Option<f64>,
    pub bidder_count: Option<u32>,
    pub bid_mean: Option<f64>,
    pub bid_sigma: Option<f64>,
    pub floor_price: Option<f64>,
    pub take_rate: Option<f64>,
    pub max_fills_per_session: Option<u32>,
    pub min_fill_gap_s: Option<f64>,
    pub policy: Option<PolicyKind>,
}

impl SimParamsPatch {
    /// True when the patch changes nothing
    pub fn is_empty(&self) -> bool {
        *self == SimParamsPatch::default()
    }

    /// Parse a patch from its JSON wire form
    pub fn from_json(json: &str) -> Result<Self, PatchParseError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Clamp into [lo, hi], substituting `fallback` for non-finite input
fn clamp_range(value: f64, lo: f64, hi: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value.clamp(lo, hi)
    } else {
        fallback
    }
}
