//! Per-second KPI aggregation
//!
//! Raw per-tick activity is folded into a [`SecondAccumulator`]; every
//! time the clock crosses a whole-second boundary the accumulator is
//! flushed into a [`SecondSnapshot`] of derived KPIs and pushed onto
//! the rolling history series.
//!
//! # Aggregation Flow
//!
//! ```text
//! tick ──record──▶ SecondAccumulator ──flush──▶ SecondSnapshot
//!                        │                          │
//!                        └── PriceReservoir         └── RollingSeries (120s)
//! ```
//!
//! # Critical Invariants
//!
//! - fills + rejections = opportunities, per second, exactly
//! - Trailing-window rates are ratios of summed counts (volume
//!   weighted), never averages of per-second ratios
//! - Percentiles come from a bounded reservoir, so memory use does not
//!   grow with run length

use serde::{Deserialize, Serialize};

use crate::models::outcome::{AuctionOutcome, ExitKind, NoFillReason};
use crate::rng::RngStream;
use crate::series::{RingSeries, HISTORY_CAPACITY};
use crate::sessions::{AdvanceStats, SessionExit, SpawnReport};

/// Seconds covered by the trailing-window KPIs.
pub const TRAILING_WINDOW_S: usize = 60;

/// Clearing prices retained for percentile estimation.
const RESERVOIR_CAPACITY: usize = 256;

// ============================================================================
// Second Accumulator
// ============================================================================

/// Raw counters for the second currently being accumulated
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecondAccumulator {
    /// Ticks folded into this second so far
    pub ticks: u32,
    /// Sessions admitted
    pub arrivals: u32,
    /// Arrivals rejected at the live-session cap
    pub turned_away: u32,
    /// Ad opportunities drawn
    pub opportunities: u32,
    /// Opportunities that cleared
    pub fills: u32,
    /// Clicks on delivered ads
    pub clicks: u32,
    /// Rejections by the show/suppress gate
    pub no_fill_policy: u32,
    /// Rejections by the floor price
    pub no_fill_floor: u32,
    /// Rejections by the lifetime fill cap
    pub no_fill_cap: u32,
    /// Rejections by the minimum fill gap
    pub no_fill_min_gap: u32,
    /// Sessions that reached their natural lifetime
    pub exits_natural: u32,
    /// Sessions that left early via the hazard
    pub exits_early: u32,
    /// Sum of clearing prices
    pub spend: f64,
    /// Platform share of spend
    pub take: f64,
    /// Σ (mean live fatigue this tick × dt)
    fatigue_weighted: f64,
    /// Σ dt over ticks that had live sessions
    fatigue_weight_s: f64,
}

impl SecondAccumulator {
    /// Fold one tick's pool aggregates in
    pub fn record_tick(&mut self, dt: f64, stats: &AdvanceStats) {
        self.ticks += 1;
        if stats.live_samples > 0 {
            let mean = stats.fatigue_sum / stats.live_samples as f64;
            self.fatigue_weighted += mean * dt;
            self.fatigue_weight_s += dt;
        }
    }

    /// Fold one tick's arrivals in
    pub fn record_spawn(&mut self, report: &SpawnReport) {
        self.arrivals += report.created.len() as u32;
        self.turned_away += report.turned_away;
    }

    /// Fold one session exit in
    pub fn record_exit(&mut self, exit: &SessionExit) {
        match exit.kind {
            ExitKind::Natural => self.exits_natural += 1,
            ExitKind::Early => self.exits_early += 1,
        }
    }

    /// Fold one opportunity outcome in
    pub fn record_outcome(&mut self, outcome: &AuctionOutcome, take_rate: f64) {
        self.opportunities += 1;
        if outcome.cleared {
            self.fills += 1;
            self.spend += outcome.price;
            self.take += outcome.price * take_rate;
            if outcome.clicked {
                self.clicks += 1;
            }
        } else {
            match outcome.reason {
                Some(NoFillReason::Policy) => self.no_fill_policy += 1,
                Some(NoFillReason::Floor) => self.no_fill_floor += 1,
                Some(NoFillReason::FillCap) => self.no_fill_cap += 1,
                Some(NoFillReason::MinGap) => self.no_fill_min_gap += 1,
                None => debug_assert!(false, "rejected outcome without reason"),
            }
        }
    }

    /// Total rejections across all reasons
    pub fn no_fill_total(&self) -> u32 {
        self.no_fill_policy + self.no_fill_floor + self.no_fill_cap + self.no_fill_min_gap
    }

    /// Time-weighted mean live fatigue over this second
    pub fn mean_fatigue(&self) -> f64 {
        if self.fatigue_weight_s > 0.0 {
            self.fatigue_weighted / self.fatigue_weight_s
        } else {
            0.0
        }
    }

    /// Zero everything for the next second
    pub fn reset(&mut self) {
        *self = SecondAccumulator::default();
    }
}

// ============================================================================
// Price Reservoir
// ============================================================================

/// Bounded uniform sample of clearing prices (Algorithm R)
///
/// Keeps a uniform random sample of all prices seen so far in fixed
/// memory; replacement draws come from the caller's metrics stream so
/// sampling stays deterministic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceReservoir {
    samples: Vec<f64>,
    capacity: usize,
    seen: u64,
}

impl PriceReservoir {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "reservoir capacity must be positive");
        Self {
            samples: Vec::with_capacity(capacity),
            capacity,
            seen: 0,
        }
    }

    /// Offer one price to the reservoir
    pub fn offer(&mut self, price: f64, rng: &mut RngStream) {
        self.seen += 1;
        if self.samples.len() < self.capacity {
            self.samples.push(price);
            return;
        }
        let slot = (rng.next_f64() * self.seen as f64) as u64;
        if slot < self.capacity as u64 {
            self.samples[slot as usize] = price;
        }
    }

    /// Nearest-rank percentile of the sampled prices
    ///
    /// `p` in [0, 1]; returns None while the reservoir is empty.
    pub fn percentile(&self, p: f64) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        let mut sorted = self.samples.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let rank = (p.clamp(0.0, 1.0) * sorted.len() as f64).ceil() as usize;
        Some(sorted[rank.saturating_sub(1).min(sorted.len() - 1)])
    }

    /// Prices currently sampled
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Prices ever offered
    pub fn seen(&self) -> u64 {
        self.seen
    }

    /// Discard all samples
    pub fn clear(&mut self) {
        self.samples.clear();
        self.seen = 0;
    }
}

// ============================================================================
// Rolling Series
// ============================================================================

/// Rolling 120-second history, one entry per flushed second
#[derive(Debug, Clone)]
pub struct RollingSeries {
    pub time: RingSeries,
    pub live: RingSeries,
    pub arrivals: RingSeries,
    pub turned_away: RingSeries,
    pub opportunities: RingSeries,
    pub fills: RingSeries,
    pub clicks: RingSeries,
    pub no_fill_policy: RingSeries,
    pub no_fill_floor: RingSeries,
    pub no_fill_cap: RingSeries,
    pub no_fill_min_gap: RingSeries,
    pub spend: RingSeries,
    pub take: RingSeries,
    pub mean_fatigue: RingSeries,
    pub exits_natural: RingSeries,
    pub exits_early: RingSeries,
}

impl RollingSeries {
    pub fn new() -> Self {
        Self {
            time: RingSeries::new(HISTORY_CAPACITY),
            live: RingSeries::new(HISTORY_CAPACITY),
            arrivals: RingSeries::new(HISTORY_CAPACITY),
            turned_away: RingSeries::new(HISTORY_CAPACITY),
            opportunities: RingSeries::new(HISTORY_CAPACITY),
            fills: RingSeries::new(HISTORY_CAPACITY),
            clicks: RingSeries::new(HISTORY_CAPACITY),
            no_fill_policy: RingSeries::new(HISTORY_CAPACITY),
            no_fill_floor: RingSeries::new(HISTORY_CAPACITY),
            no_fill_cap: RingSeries::new(HISTORY_CAPACITY),
            no_fill_min_gap: RingSeries::new(HISTORY_CAPACITY),
            spend: RingSeries::new(HISTORY_CAPACITY),
            take: RingSeries::new(HISTORY_CAPACITY),
            mean_fatigue: RingSeries::new(HISTORY_CAPACITY),
            exits_natural: RingSeries::new(HISTORY_CAPACITY),
            exits_early: RingSeries::new(HISTORY_CAPACITY),
        }
    }

    /// Copy every series out as plain vectors, oldest first
    pub fn snapshot(&self) -> SeriesSnapshot {
        SeriesSnapshot {
            time: self.time.to_vec(),
            live: self.live.to_vec(),
            arrivals: self.arrivals.to_vec(),
            turned_away: self.turned_away.to_vec(),
            opportunities: self.opportunities.to_vec(),
            fills: self.fills.to_vec(),
            clicks: self.clicks.to_vec(),
            no_fill_policy: self.no_fill_policy.to_vec(),
            no_fill_floor: self.no_fill_floor.to_vec(),
            no_fill_cap: self.no_fill_cap.to_vec(),
            no_fill_min_gap: self.no_fill_min_gap.to_vec(),
            spend: self.spend.to_vec(),
            take: self.take.to_vec(),
            mean_fatigue: self.mean_fatigue.to_vec(),
            exits_natural: self.exits_natural.to_vec(),
            exits_early: self.exits_early.to_vec(),
        }
    }

    fn clear(&mut self) {
        self.time.clear();
        self.live.clear();
        self.arrivals.clear();
        self.turned_away.clear();
        self.opportunities.clear();
        self.fills.clear();
        self.clicks.clear();
        self.no_fill_policy.clear();
        self.no_fill_floor.clear();
        self.no_fill_cap.clear();
        self.no_fill_min_gap.clear();
        self.spend.clear();
        self.take.clear();
        self.mean_fatigue.clear();
        self.exits_natural.clear();
        self.exits_early.clear();
    }
}

impl Default for RollingSeries {
    fn default() -> Self {
        Self::new()
    }
}

/// Plain-vector copy of the rolling history, for hosts and charts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesSnapshot {
    pub time: Vec<f64>,
    pub live: Vec<f64>,
    pub arrivals: Vec<f64>,
    pub turned_away: Vec<f64>,
    pub opportunities: Vec<f64>,
    pub fills: Vec<f64>,
    pub clicks: Vec<f64>,
    pub no_fill_policy: Vec<f64>,
    pub no_fill_floor: Vec<f64>,
    pub no_fill_cap: Vec<f64>,
    pub no_fill_min_gap: Vec<f64>,
    pub spend: Vec<f64>,
    pub take: Vec<f64>,
    pub mean_fatigue: Vec<f64>,
    pub exits_natural: Vec<f64>,
    pub exits_early: Vec<f64>,
}

// ============================================================================
// Second Snapshot
// ============================================================================

/// Rejection counts split by cause
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NoFillBreakdown {
    pub policy: u32,
    pub floor: u32,
    pub fill_cap: u32,
    pub min_gap: u32,
}

impl NoFillBreakdown {
    pub fn total(&self) -> u32 {
        self.policy + self.floor + self.fill_cap + self.min_gap
    }
}

/// Derived KPIs flushed once per simulated second
///
/// `time_s` is the boundary just crossed: the first flush reports 1.0,
/// the next 2.0, and so on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecondSnapshot {
    /// 1-based flush index
    pub seq: u64,
    /// Whole-second boundary this snapshot covers up to
    pub time_s: f64,

    // Instantaneous (this second)
    pub live_sessions: u32,
    pub arrivals: u32,
    pub turned_away: u32,
    /// True when any arrival was rejected at the cap this second
    pub cap_hit: bool,
    pub opportunities: u32,
    pub fills: u32,
    pub clicks: u32,
    pub no_fill: NoFillBreakdown,
    pub exits_natural: u32,
    pub exits_early: u32,
    /// Sum of clearing prices this second
    pub spend: f64,
    /// Platform share of spend this second
    pub take: f64,
    /// Time-weighted mean live fatigue this second
    pub mean_fatigue: f64,
    /// fills / opportunities this second (0 when no opportunities)
    pub fill_rate: f64,

    // Trailing window (up to TRAILING_WINDOW_S seconds)
    pub fill_rate_60: f64,
    /// Volume-weighted average clearing price: spend₆₀ / fills₆₀
    pub avg_price_60: f64,
    pub spend_per_s_60: f64,
    pub take_per_s_60: f64,
    /// clicks₆₀ / fills₆₀
    pub ctr_60: f64,
    pub arrivals_per_s_60: f64,
    pub no_fill_60: NoFillBreakdown,

    /// Median clearing price over the sampled run history
    pub p50_price: f64,
    /// 90th-percentile clearing price over the sampled run history
    pub p90_price: f64,

    /// Cumulative truncated-normal clamp fallbacks (sampler diagnostic)
    pub diag_clamp_fallbacks: u64,
}

// ============================================================================
// Metrics Engine
// ============================================================================

/// Owner of the accumulator, reservoir, and rolling history
#[derive(Debug, Clone)]
pub struct Metrics {
    acc: SecondAccumulator,
    series: RollingSeries,
    reservoir: PriceReservoir,
    /// True when any arrival was turned away since the last flush
    cap_hit: bool,
    flushes: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            acc: SecondAccumulator::default(),
            series: RollingSeries::new(),
            reservoir: PriceReservoir::new(RESERVOIR_CAPACITY),
            cap_hit: false,
            flushes: 0,
        }
    }

    pub fn record_tick(&mut self, dt: f64, stats: &AdvanceStats) {
        self.acc.record_tick(dt, stats);
    }

    pub fn record_spawn(&mut self, report: &SpawnReport) {
        self.acc.record_spawn(report);
        if report.cap_hit() {
            self.cap_hit = true;
        }
    }

    pub fn record_exit(&mut self, exit: &SessionExit) {
        self.acc.record_exit(exit);
    }

    /// Record an outcome; cleared prices also feed the reservoir
    pub fn record_outcome(
        &mut self,
        outcome: &AuctionOutcome,
        take_rate: f64,
        rng: &mut RngStream,
    ) {
        self.acc.record_outcome(outcome, take_rate);
        if outcome.cleared {
            self.reservoir.offer(outcome.price, rng);
        }
    }

    /// Seconds flushed so far
    pub fn flushes(&self) -> u64 {
        self.flushes
    }

    /// Rolling per-second history
    pub fn series(&self) -> &RollingSeries {
        &self.series
    }

    /// Raw accumulator for the in-progress second
    pub fn accumulator(&self) -> &SecondAccumulator {
        &self.acc
    }

    /// Flush the accumulated second into a snapshot and reset
    ///
    /// # Arguments
    /// * `live_sessions` - Live count at the boundary
    /// * `clamp_fallbacks` - Cumulative sampler clamp count (diagnostic)
    pub fn flush_second(&mut self, live_sessions: u32, clamp_fallbacks: u64) -> SecondSnapshot {
        self.flushes += 1;

        let acc = &self.acc;
        let no_fill = NoFillBreakdown {
            policy: acc.no_fill_policy,
            floor: acc.no_fill_floor,
            fill_cap: acc.no_fill_cap,
            min_gap: acc.no_fill_min_gap,
        };

        // Push this second into the history before computing windows, so
        // the trailing figures include it.
        self.series.time.push(self.flushes as f64);
        self.series.live.push(live_sessions as f64);
        self.series.arrivals.push(acc.arrivals as f64);
        self.series.turned_away.push(acc.turned_away as f64);
        self.series.opportunities.push(acc.opportunities as f64);
        self.series.fills.push(acc.fills as f64);
        self.series.clicks.push(acc.clicks as f64);
        self.series.no_fill_policy.push(acc.no_fill_policy as f64);
        self.series.no_fill_floor.push(acc.no_fill_floor as f64);
        self.series.no_fill_cap.push(acc.no_fill_cap as f64);
        self.series.no_fill_min_gap.push(acc.no_fill_min_gap as f64);
        self.series.spend.push(acc.spend);
        self.series.take.push(acc.take);
        self.series.mean_fatigue.push(acc.mean_fatigue());
        self.series.exits_natural.push(acc.exits_natural as f64);
        self.series.exits_early.push(acc.exits_early as f64);

        let window = TRAILING_WINDOW_S;
        let covered_s = self.series.time.len().min(window) as f64;
        let fills_60 = self.series.fills.sum_last(window);
        let opps_60 = self.series.opportunities.sum_last(window);
        let spend_60 = self.series.spend.sum_last(window);
        let take_60 = self.series.take.sum_last(window);
        let clicks_60 = self.series.clicks.sum_last(window);
        let arrivals_60 = self.series.arrivals.sum_last(window);

        let snapshot = SecondSnapshot {
            seq: self.flushes,
            time_s: self.flushes as f64,
            live_sessions,
            arrivals: acc.arrivals,
            turned_away: acc.turned_away,
            cap_hit: self.cap_hit,
            opportunities: acc.opportunities,
            fills: acc.fills,
            clicks: acc.clicks,
            no_fill,
            exits_natural: acc.exits_natural,
            exits_early: acc.exits_early,
            spend: acc.spend,
            take: acc.take,
            mean_fatigue: acc.mean_fatigue(),
            fill_rate: ratio(acc.fills as f64, acc.opportunities as f64),
            fill_rate_60: ratio(fills_60, opps_60),
            avg_price_60: ratio(spend_60, fills_60),
            spend_per_s_60: ratio(spend_60, covered_s),
            take_per_s_60: ratio(take_60, covered_s),
            ctr_60: ratio(clicks_60, fills_60),
            arrivals_per_s_60: ratio(arrivals_60, covered_s),
            no_fill_60: NoFillBreakdown {
                policy: self.series.no_fill_policy.sum_last(window) as u32,
                floor: self.series.no_fill_floor.sum_last(window) as u32,
                fill_cap: self.series.no_fill_cap.sum_last(window) as u32,
                min_gap: self.series.no_fill_min_gap.sum_last(window) as u32,
            },
            p50_price: self.reservoir.percentile(0.50).unwrap_or(0.0),
            p90_price: self.reservoir.percentile(0.90).unwrap_or(0.0),
            diag_clamp_fallbacks: clamp_fallbacks,
        };

        self.acc.reset();
        self.cap_hit = false;
        snapshot
    }

    /// Forget everything for a fresh run
    pub fn reset(&mut self) {
        self.acc.reset();
        self.series.clear();
        self.reservoir.clear();
        self.cap_hit = false;
        self.flushes = 0;
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Guarded division: 0.0 when the denominator is zero
fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}
