//! Session lifecycle management
//!
//! Owns the set of live sessions and drives their per-tick dynamics:
//!
//! ```text
//! For each tick t:
//! 1. Spawn arrivals (Poisson, bounded by the live-session cap)
//! 2. Age and decay every live session
//! 3. Remove natural exits (age past sampled lifetime)
//! 4. Sample early exits (fatigue-driven hazard)
//! 5. Draw ad opportunities per survivor and resolve each auction
//! ```
//!
//! # Critical Invariants
//!
//! - Live count never exceeds `max_live_sessions`; overflow arrivals
//!   are counted as turned away, not queued
//! - A session that exits in a tick generates no opportunities that tick
//! - `live` stays sorted by id (spawn order), so iteration order and
//!   therefore RNG draw order is stable
//!
//! # Randomness
//!
//! Three streams keep subsystems independent: the arrivals stream only
//! draws arrival counts, the lifecycle stream draws session attributes
//! and exit hazards, and the auction stream draws opportunity counts,
//! gate trials, and clicks.

use serde::{Deserialize, Serialize};

use crate::auction::resolve_opportunity;
use crate::config::SimParams;
use crate::models::bidder::Bidder;
use crate::models::outcome::{AuctionOutcome, ExitKind};
use crate::models::session::Session;
use crate::policy::GatePolicy;
use crate::rng::RngStream;

/// Bounds for the per-session tolerance draw.
const TOLERANCE_MIN: f64 = 0.05;
const TOLERANCE_MAX: f64 = 10.0;

/// Floor on sampled lifetimes; keeps the baseline hazard 1/lifetime finite.
const MIN_LIFETIME_S: f64 = 1.0;

/// Arrivals admitted and rejected in one tick
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpawnReport {
    /// Ids of sessions created this tick, in spawn order
    pub created: Vec<u64>,
    /// Arrivals rejected because the live-session cap was reached
    pub turned_away: u32,
}

impl SpawnReport {
    /// True when at least one arrival was rejected at the cap
    pub fn cap_hit(&self) -> bool {
        self.turned_away > 0
    }
}

/// One session leaving the simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionExit {
    pub session_id: u64,
    pub kind: ExitKind,
    /// Lifetime fill count at exit
    pub fills: u32,
    /// Lifetime click count at exit
    pub clicks: u32,
}

/// Per-tick aggregates computed while advancing the pool
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AdvanceStats {
    /// Sum of fatigue across sessions still live at tick end
    pub fatigue_sum: f64,
    /// Sessions still live at tick end
    pub live_samples: u32,
}

/// Owner of all live sessions
///
/// # Example
/// ```
/// use auction_sim_core_rs::{RngStream, SessionPool, SimParams};
///
/// let mut pool = SessionPool::new();
/// let params = SimParams::default();
/// let mut arrivals = RngStream::new(1, "arrivals");
/// let mut lifecycle = RngStream::new(1, "sessions");
///
/// let report = pool.spawn_arrivals(0.2, &params, &mut arrivals, &mut lifecycle);
/// assert_eq!(pool.live_count(), report.created.len());
/// ```
#[derive(Debug, Clone)]
pub struct SessionPool {
    /// Live sessions in spawn order (ascending id)
    live: Vec<Session>,
    /// Next id to assign; ids are monotonic within a run
    next_id: u64,
}

impl SessionPool {
    pub fn new() -> Self {
        Self {
            live: Vec::new(),
            next_id: 1,
        }
    }

    pub fn live(&self) -> &[Session] {
        &self.live
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Sessions ever spawned in this run
    pub fn total_spawned(&self) -> u64 {
        self.next_id - 1
    }

    /// Look up a live session by id
    pub fn get(&self, session_id: u64) -> Option<&Session> {
        self.live.iter().find(|s| s.id() == session_id)
    }

    /// Forget all sessions and restart id assignment
    pub fn reset(&mut self) {
        self.live.clear();
        self.next_id = 1;
    }

    /// Spawn this tick's arrivals, respecting the live-session cap
    ///
    /// Draws Poisson(arrival_rate · dt) on the arrivals stream, admits
    /// up to the cap, and samples lifetime (exponential) and tolerance
    /// (truncated normal) for each admitted session on the lifecycle
    /// stream. Turned-away arrivals draw no attributes, so the cap does
    /// not shift later draws.
    pub fn spawn_arrivals(
        &mut self,
        dt: f64,
        params: &SimParams,
        arrivals_rng: &mut RngStream,
        lifecycle_rng: &mut RngStream,
    ) -> SpawnReport {
        let requested = arrivals_rng.poisson(params.arrival_rate_per_s * dt);
        let capacity_left = params.max_live_sessions.saturating_sub(self.live.len());
        let admitted = (requested as usize).min(capacity_left);

        let mut report = SpawnReport {
            created: Vec::with_capacity(admitted),
            turned_away: requested - admitted as u32,
        };

        for _ in 0..admitted {
            let id = self.next_id;
            self.next_id += 1;

            let lifetime = lifecycle_rng
                .exponential(params.mean_session_lifetime_s)
                .max(MIN_LIFETIME_S);
            let tolerance = lifecycle_rng.truncated_normal(
                params.tolerance_mean,
                params.tolerance_sd,
                TOLERANCE_MIN,
                TOLERANCE_MAX,
            );

            self.live.push(Session::new(id, lifetime, tolerance));
            report.created.push(id);
        }

        report
    }

    /// Advance every live session by `dt` and resolve its opportunities
    ///
    /// Appends this tick's outcomes and exits to the caller's buffers
    /// (they are not cleared here) and returns fatigue aggregates over
    /// the survivors.
    #[allow(clippy::too_many_arguments)]
    pub fn advance_tick(
        &mut self,
        dt: f64,
        params: &SimParams,
        policy: &dyn GatePolicy,
        bidders: &[Bidder],
        lifecycle_rng: &mut RngStream,
        auction_rng: &mut RngStream,
        outcomes: &mut Vec<AuctionOutcome>,
        exits: &mut Vec<SessionExit>,
    ) -> AdvanceStats {
        let mut stats = AdvanceStats::default();
        let first_new_exit = exits.len();

        for session in self.live.iter_mut() {
            session.begin_tick();
            session.advance_age(dt);
            session.decay(params.decay_per_s, dt);

            // Natural end: no hazard draw, no opportunities this tick.
            if session.is_past_lifetime() {
                exits.push(SessionExit {
                    session_id: session.id(),
                    kind: ExitKind::Natural,
                    fills: session.fills(),
                    clicks: session.clicks(),
                });
                continue;
            }

            let p_exit = 1.0 - (-hazard_rate(session, params) * dt).exp();
            if lifecycle_rng.chance(p_exit) {
                exits.push(SessionExit {
                    session_id: session.id(),
                    kind: ExitKind::Early,
                    fills: session.fills(),
                    clicks: session.clicks(),
                });
                continue;
            }

            let opportunities = auction_rng.poisson(params.opportunity_rate_per_s * dt);
            for _ in 0..opportunities {
                outcomes.push(resolve_opportunity(
                    session, params, policy, bidders, auction_rng,
                ));
            }

            stats.fatigue_sum += session.fatigue();
            stats.live_samples += 1;
        }

        self.remove_exited(&exits[first_new_exit..]);
        stats
    }

    /// Drop the sessions named in `exits`, preserving order
    ///
    /// Exit ids arrive in encounter order, which matches the ascending
    /// id order of `live`, so one forward pass suffices.
    fn remove_exited(&mut self, exits: &[SessionExit]) {
        if exits.is_empty() {
            return;
        }
        let mut doomed = exits.iter().map(|e| e.session_id).peekable();
        self.live.retain(|session| {
            if doomed.peek() == Some(&session.id()) {
                doomed.next();
                false
            } else {
                true
            }
        });
    }
}

impl Default for SessionPool {
    fn default() -> Self {
        Self::new()
    }
}

/// Instantaneous early-exit hazard for a session
///
/// h = (1 / lifetime) · (1 + hazard_gain · fatigue / tolerance)
///
/// The baseline hazard matches the scale of the session's natural
/// lifetime; fatigue relative to tolerance multiplies it up.
fn hazard_rate(session: &Session, params: &SimParams) -> f64 {
    let base = 1.0 / session.target_lifetime_s().max(1e-9);
    let pressure = params.hazard_gain * session.fatigue() / session.tolerance().max(1e-6);
    base * (1.0 + pressure)
}
