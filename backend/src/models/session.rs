//! Session model
//!
//! Represents one live audience session. Each session carries:
//! - Sampled attributes fixed at spawn (target lifetime, fatigue tolerance)
//! - Evolving fatigue state driven by fills and decay
//! - Fill/click counters used by caps and KPIs
//!
//! Fatigue is the central quantity: it decays continuously with time,
//! jumps by a fixed increment on every fill, and feeds the CTR curve,
//! the bid-quality multiplier, the adaptive gate, and the early-exit
//! hazard.
//!
//! CRITICAL: fatigue never goes below zero.

use serde::{Deserialize, Serialize};

/// One live audience session
///
/// # Example
/// ```
/// use auction_sim_core_rs::Session;
///
/// let mut session = Session::new(1, 45.0, 1.2);
/// session.record_fill(0.22);
/// assert_eq!(session.fills(), 1);
/// assert!(session.fatigue() > 0.0);
///
/// session.decay(0.08, 2.0); // two quiet seconds
/// assert!(session.fatigue() < 0.22);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Monotonic id, unique within one run
    id: u64,

    /// Seconds this session has been live
    age_s: f64,

    /// Sampled natural lifetime (seconds); the session ends when age reaches it
    target_lifetime_s: f64,

    /// Sampled fatigue tolerance; overload beyond it drives gating and exits
    tolerance: f64,

    /// Current fatigue level, never negative
    fatigue: f64,

    /// Fatigue at the start of the current tick, before decay and fills
    prev_fatigue: f64,

    /// Fills delivered to this session so far
    fills: u32,

    /// Clicks recorded for this session so far
    clicks: u32,

    /// Age at the most recent fill, None until the first fill
    last_fill_age_s: Option<f64>,
}

impl Session {
    /// Create a freshly arrived session
    ///
    /// # Arguments
    /// * `id` - Monotonic id assigned by the pool
    /// * `target_lifetime_s` - Sampled natural lifetime in seconds
    /// * `tolerance` - Sampled fatigue tolerance
    pub fn new(id: u64, target_lifetime_s: f64, tolerance: f64) -> Self {
        Self {
            id,
            age_s: 0.0,
            target_lifetime_s,
            tolerance,
            fatigue: 0.0,
            prev_fatigue: 0.0,
            fills: 0,
            clicks: 0,
            last_fill_age_s: None,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn age_s(&self) -> f64 {
        self.age_s
    }

    pub fn target_lifetime_s(&self) -> f64 {
        self.target_lifetime_s
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn fatigue(&self) -> f64 {
        self.fatigue
    }

    /// Fatigue as of the start of the current tick
    pub fn prev_fatigue(&self) -> f64 {
        self.prev_fatigue
    }

    pub fn fills(&self) -> u32 {
        self.fills
    }

    pub fn clicks(&self) -> u32 {
        self.clicks
    }

    /// Age at the most recent fill, if any
    pub fn last_fill_age_s(&self) -> Option<f64> {
        self.last_fill_age_s
    }

    /// Snapshot fatigue into `prev_fatigue` before this tick's dynamics run
    pub(crate) fn begin_tick(&mut self) {
        self.prev_fatigue = self.fatigue;
    }

    /// Advance age by `dt` seconds
    pub fn advance_age(&mut self, dt: f64) {
        self.age_s += dt;
    }

    /// Apply continuous fatigue recovery, floored at zero
    pub fn decay(&mut self, decay_per_s: f64, dt: f64) {
        self.fatigue = (self.fatigue - decay_per_s * dt).max(0.0);
    }

    /// True once age has reached the sampled natural lifetime
    pub fn is_past_lifetime(&self) -> bool {
        self.age_s >= self.target_lifetime_s
    }

    /// Seconds since the last fill, None before the first fill
    pub fn gap_since_last_fill(&self) -> Option<f64> {
        self.last_fill_age_s.map(|at| self.age_s - at)
    }

    /// Click-through probability at the current fatigue level
    ///
    /// CTR = base_ctr · e^(−ctr_penalty · fatigue); rested sessions click
    /// at the base rate, fatigued sessions exponentially less.
    pub fn effective_ctr(&self, base_ctr: f64, ctr_penalty: f64) -> f64 {
        base_ctr * (-ctr_penalty * self.fatigue).exp()
    }

    /// Multiplier applied to every bid in this session's auctions
    ///
    /// quality = e^(−quality_penalty · fatigue), in (0, 1]
    pub fn quality_multiplier(&self, quality_penalty: f64) -> f64 {
        (-quality_penalty * self.fatigue).exp()
    }

    /// How far fatigue currently exceeds tolerance (0 when under)
    pub fn overload(&self) -> f64 {
        (self.fatigue - self.tolerance).max(0.0)
    }

    /// Record a delivered fill: bump the counter, remember the age, add fatigue
    pub fn record_fill(&mut self, fill_increment: f64) {
        self.fills += 1;
        self.last_fill_age_s = Some(self.age_s);
        self.fatigue += fill_increment;
    }

    /// Record a click on the most recent fill
    pub fn record_click(&mut self) {
        self.clicks += 1;
    }
}

/// Read-only projection of a session for snapshot consumers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionView {
    pub id: u64,
    pub age_s: f64,
    pub target_lifetime_s: f64,
    pub tolerance: f64,
    pub fatigue: f64,
    pub fills: u32,
    pub clicks: u32,
}

impl From<&Session> for SessionView {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id,
            age_s: session.age_s,
            target_lifetime_s: session.target_lifetime_s,
            tolerance: session.tolerance,
            fatigue: session.fatigue,
            fills: session.fills,
            clicks: session.clicks,
        }
    }
}
