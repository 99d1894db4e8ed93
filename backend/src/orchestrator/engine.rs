//! Simulation Engine
//!
//! Main simulation loop integrating all components:
//! - Session arrivals (Poisson sampling against the live cap)
//! - Session dynamics (aging, fatigue decay, hazard exits)
//! - Opportunity resolution (gating checks + second-price auction)
//! - Per-second KPI aggregation (accumulator flush on boundary crossings)
//! - Event logging (bounded simulation history)
//!
//! # Architecture
//!
//! `Simulation` implements the tick loop:
//!
//! ```text
//! For each tick of dt seconds:
//! 1. Spawn arrivals (Poisson sampling, live cap enforced)
//! 2. Advance sessions (age, decay, exits, opportunities, auctions)
//! 3. Record outcomes (metrics accumulator + event log)
//! 4. Advance the clock; flush one snapshot per second boundary crossed
//! ```
//!
//! # Determinism
//!
//! Everything stochastic draws from one of four labeled streams derived
//! from the run seed (`arrivals`, `sessions`, `auction`, `metrics`).
//! Two runs with the same seed, the same parameter timeline, and the
//! same tick sizes produce identical snapshots and an identical replay
//! digest. `run_id` is the only field regenerated per run and is kept
//! out of snapshots for that reason.
//!
//! # Example
//!
//! ```rust
//! use auction_sim_core_rs::Simulation;
//!
//! let mut sim = Simulation::new(42);
//! for _ in 0..20 {
//!     sim.tick(0.1);
//! }
//! let snapshot = sim.last_second().expect("two seconds elapsed");
//! assert_eq!(snapshot.time_s, 2.0);
//! ```

use std::collections::VecDeque;

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::{SimParams, SimParamsPatch};
use crate::core::time::{SimClock, MAX_DT_S};
use crate::metrics::{Metrics, SecondSnapshot, SeriesSnapshot};
use crate::models::{AuctionOutcome, Bidder, BidderPool, Event, EventLog, Session, SessionView};
use crate::policy::{build_policy, GatePolicy};
use crate::rng::RngStream;
use crate::series::HISTORY_CAPACITY;
use crate::sessions::{SessionExit, SessionPool};

/// Retained event capacity; older events are evicted first.
pub const EVENT_LOG_CAPACITY: usize = 512;

/// Undrained snapshots kept for a slow host before the oldest is dropped.
pub const PENDING_SECONDS_CAPACITY: usize = HISTORY_CAPACITY;

// ============================================================================
// Errors
// ============================================================================

/// Errors surfaced by the simulation facade
#[derive(Debug, Clone, PartialEq)]
pub enum SimError {
    /// A wire-format parameter patch could not be parsed
    InvalidPatch(String),
    /// A snapshot could not be serialized for the host
    Serialization(String),
}

impl std::fmt::Display for SimError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimError::InvalidPatch(msg) => write!(f, "invalid parameter patch: {}", msg),
            SimError::Serialization(msg) => write!(f, "serialization failed: {}", msg),
        }
    }
}

impl std::error::Error for SimError {}

// ============================================================================
// Tick Report
// ============================================================================

/// Summary of a single `tick()` call
///
/// Purely informational; the durable record of a run is the snapshot
/// stream and the event log.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// Simulation time after the tick
    pub time_s: f64,
    /// Sessions spawned this tick
    pub arrivals: u32,
    /// Arrivals rejected at the live cap this tick
    pub turned_away: u32,
    /// Opportunities resolved this tick (fills + rejections)
    pub opportunities: u32,
    /// Opportunities that cleared this tick
    pub fills: u32,
    /// Sessions that ended this tick
    pub exits: u32,
    /// Second boundaries crossed by this tick
    pub seconds_flushed: u32,
}

// ============================================================================
// RNG Streams
// ============================================================================

/// The four independent streams a run draws from
///
/// Keeping concerns on separate streams means a parameter change that
/// alters how often one subsystem samples cannot perturb the draw
/// sequence of another.
struct Streams {
    /// Arrival counts per tick
    arrivals: RngStream,
    /// Session attributes at spawn + hazard exit draws
    sessions: RngStream,
    /// Opportunity counts, gate draws, click draws
    auction: RngStream,
    /// Reservoir replacement positions
    metrics: RngStream,
}

impl Streams {
    fn new(seed: u32) -> Self {
        Self {
            arrivals: RngStream::new(seed, "arrivals"),
            sessions: RngStream::new(seed, "sessions"),
            auction: RngStream::new(seed, "auction"),
            metrics: RngStream::new(seed, "metrics"),
        }
    }
}

// ============================================================================
// Listener Registry
// ============================================================================

/// Opaque handle for detaching a per-second callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerHandle(u64);

struct ListenerSlot {
    id: u64,
    callback: Box<dyn FnMut(&SecondSnapshot)>,
}

// ============================================================================
// Simulation
// ============================================================================

/// Top-level simulation facade
///
/// Owns the clock, the RNG streams, the session pool, the bidder pool,
/// the metrics engine, and the event log, and advances them together
/// through `tick()`.
pub struct Simulation {
    params: SimParams,
    seed: u32,
    /// Fresh per run; excluded from snapshots so same-seed runs compare equal
    run_id: String,

    clock: SimClock,
    streams: Streams,
    pool: SessionPool,
    bidders: BidderPool,
    policy: Box<dyn GatePolicy>,
    metrics: Metrics,
    events: EventLog,

    listeners: Vec<ListenerSlot>,
    next_listener_id: u64,
    /// Snapshots flushed but not yet drained by the host
    pending: VecDeque<SecondSnapshot>,
    last_second: Option<SecondSnapshot>,
    /// Running hash over every flushed snapshot
    digest: Sha256,

    // Scratch buffers reused across ticks
    outcomes_buf: Vec<AuctionOutcome>,
    exits_buf: Vec<SessionExit>,
}

impl Simulation {
    /// Create a simulation with default parameters
    pub fn new(seed: u32) -> Self {
        Self::with_params(seed, SimParams::default())
    }

    /// Create a simulation with explicit parameters
    ///
    /// Parameters are clamped into their documented ranges before use,
    /// so construction never fails.
    pub fn with_params(seed: u32, params: SimParams) -> Self {
        let params = params.clamped();
        let policy = build_policy(&params.policy);
        let bidders =
            BidderPool::generate(seed, params.bidder_count, params.bid_mean, params.bid_sigma);

        let mut events = EventLog::new(EVENT_LOG_CAPACITY);
        events.record(Event::Reset { time_s: 0.0, seed });

        Self {
            params,
            seed,
            run_id: Uuid::new_v4().to_string(),
            clock: SimClock::new(),
            streams: Streams::new(seed),
            pool: SessionPool::new(),
            bidders,
            policy,
            metrics: Metrics::new(),
            events,
            listeners: Vec::new(),
            next_listener_id: 1,
            pending: VecDeque::new(),
            last_second: None,
            digest: Sha256::new(),
            outcomes_buf: Vec::new(),
            exits_buf: Vec::new(),
        }
    }

    // ========================================================================
    // Tick Loop
    // ========================================================================

    /// Advance the simulation by `dt` seconds
    ///
    /// Non-finite or non-positive `dt` is ignored; `dt` above
    /// [`MAX_DT_S`] is clamped down to it. Hosts that want several
    /// fixed steps per rendered frame should feed this through
    /// [`StepDriver`](crate::core::time::StepDriver).
    pub fn tick(&mut self, dt: f64) -> TickReport {
        let mut report = TickReport {
            time_s: self.clock.time_s(),
            ..TickReport::default()
        };
        if !dt.is_finite() || dt <= 0.0 {
            return report;
        }
        let dt = dt.min(MAX_DT_S);

        // Events within the tick are stamped with its start time.
        let t = self.clock.time_s();

        // STEP 1: Spawn arrivals (Poisson, capped by max_live_sessions)
        let spawn = self.pool.spawn_arrivals(
            dt,
            &self.params,
            &mut self.streams.arrivals,
            &mut self.streams.sessions,
        );
        self.metrics.record_spawn(&spawn);
        for &session_id in &spawn.created {
            self.events.record(Event::SessionArrived { time_s: t, session_id });
        }
        if spawn.cap_hit() {
            self.events.record(Event::CapReached {
                time_s: t,
                turned_away: spawn.turned_away,
            });
        }
        report.arrivals = spawn.created.len() as u32;
        report.turned_away = spawn.turned_away;

        // STEP 2: Advance sessions and resolve their opportunities
        let mut outcomes = std::mem::take(&mut self.outcomes_buf);
        let mut exits = std::mem::take(&mut self.exits_buf);
        outcomes.clear();
        exits.clear();
        let stats = self.pool.advance_tick(
            dt,
            &self.params,
            self.policy.as_ref(),
            self.bidders.bidders(),
            &mut self.streams.sessions,
            &mut self.streams.auction,
            &mut outcomes,
            &mut exits,
        );

        // STEP 3: Fold outcomes and exits into metrics and the event log
        for outcome in &outcomes {
            self.metrics
                .record_outcome(outcome, self.params.take_rate, &mut self.streams.metrics);
            if outcome.cleared {
                report.fills += 1;
                if let Some(winner_id) = outcome.winner_id {
                    self.events.record(Event::Filled {
                        time_s: t,
                        session_id: outcome.session_id,
                        winner_id,
                        price: outcome.price,
                        clicked: outcome.clicked,
                    });
                }
            } else if let Some(reason) = outcome.reason {
                self.events.record(Event::NoFill {
                    time_s: t,
                    session_id: outcome.session_id,
                    reason,
                });
            }
        }
        for exit in &exits {
            self.metrics.record_exit(exit);
            self.events.record(Event::SessionEnded {
                time_s: t,
                session_id: exit.session_id,
                kind: exit.kind,
                fills: exit.fills,
            });
        }
        self.metrics.record_tick(dt, &stats);
        report.opportunities = outcomes.len() as u32;
        report.exits = exits.len() as u32;
        self.outcomes_buf = outcomes;
        self.exits_buf = exits;

        // STEP 4: Advance time; flush once per boundary crossed
        let crossings = self.clock.advance(dt);
        for _ in 0..crossings {
            self.flush_second();
        }
        report.seconds_flushed = crossings;
        report.time_s = self.clock.time_s();

        report
    }

    /// Flush the in-progress second into a snapshot and deliver it
    fn flush_second(&mut self) {
        let clamp_fallbacks = self.streams.sessions.clamp_fallbacks();
        let snapshot = self
            .metrics
            .flush_second(self.pool.live_count() as u32, clamp_fallbacks);

        self.absorb_into_digest(&snapshot);

        if self.pending.len() == PENDING_SECONDS_CAPACITY {
            self.pending.pop_front();
        }
        self.pending.push_back(snapshot.clone());

        // Callbacks only see the snapshot; the registry is moved out so
        // the engine stays borrowable while they run.
        let mut listeners = std::mem::take(&mut self.listeners);
        for slot in listeners.iter_mut() {
            (slot.callback)(&snapshot);
        }
        self.listeners = listeners;

        self.last_second = Some(snapshot);
    }

    fn absorb_into_digest(&mut self, snapshot: &SecondSnapshot) {
        let digest = &mut self.digest;
        digest.update(snapshot.seq.to_le_bytes());
        digest.update(snapshot.live_sessions.to_le_bytes());
        digest.update(snapshot.arrivals.to_le_bytes());
        digest.update(snapshot.turned_away.to_le_bytes());
        digest.update(snapshot.opportunities.to_le_bytes());
        digest.update(snapshot.fills.to_le_bytes());
        digest.update(snapshot.clicks.to_le_bytes());
        digest.update(snapshot.exits_natural.to_le_bytes());
        digest.update(snapshot.exits_early.to_le_bytes());
        digest.update(snapshot.spend.to_bits().to_le_bytes());
        digest.update(snapshot.take.to_bits().to_le_bytes());
        digest.update(snapshot.mean_fatigue.to_bits().to_le_bytes());
    }

    // ========================================================================
    // Control Surface
    // ========================================================================

    /// Restart from a pristine state under a fresh seed
    ///
    /// Current parameters and attached listeners are retained; the
    /// clock, all streams, the pools, metrics, history, and the replay
    /// digest start over. A new `run_id` is issued.
    pub fn reset(&mut self, seed: u32) {
        self.seed = seed;
        self.run_id = Uuid::new_v4().to_string();
        self.clock.reset();
        self.streams = Streams::new(seed);
        self.pool.reset();
        self.bidders = BidderPool::generate(
            seed,
            self.params.bidder_count,
            self.params.bid_mean,
            self.params.bid_sigma,
        );
        self.metrics.reset();
        self.events.clear();
        self.pending.clear();
        self.last_second = None;
        self.digest = Sha256::new();
        self.events.record(Event::Reset { time_s: 0.0, seed });
    }

    /// Apply a parameter patch between ticks
    ///
    /// Patched values are clamped into range. The gate policy is
    /// rebuilt, and the bidder pool is regenerated only if any of its
    /// inputs actually changed, so an unrelated patch cannot move
    /// bidder values mid-run. An empty patch is a no-op.
    pub fn set_params(&mut self, patch: &SimParamsPatch) {
        if patch.is_empty() {
            return;
        }
        self.params = self.params.merged(patch);
        self.policy = build_policy(&self.params.policy);
        self.bidders.regenerate_if_changed(
            self.seed,
            self.params.bidder_count,
            self.params.bid_mean,
            self.params.bid_sigma,
        );
        self.events.record(Event::ParamsChanged {
            time_s: self.clock.time_s(),
        });
    }

    /// Parse a JSON patch and apply it
    pub fn set_params_json(&mut self, json: &str) -> Result<(), SimError> {
        let patch = SimParamsPatch::from_json(json)
            .map_err(|e| SimError::InvalidPatch(e.to_string()))?;
        self.set_params(&patch);
        Ok(())
    }

    /// Attach a callback invoked once per flushed second
    ///
    /// Listeners survive `reset()`. The returned handle detaches the
    /// callback via [`Simulation::detach_second_listener`].
    pub fn on_second(
        &mut self,
        callback: impl FnMut(&SecondSnapshot) + 'static,
    ) -> ListenerHandle {
        let id = self.next_listener_id;
        self.next_listener_id += 1;
        self.listeners.push(ListenerSlot {
            id,
            callback: Box::new(callback),
        });
        ListenerHandle(id)
    }

    /// Remove a previously attached callback
    ///
    /// Returns `false` if the handle was already detached.
    pub fn detach_second_listener(&mut self, handle: ListenerHandle) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|slot| slot.id != handle.0);
        self.listeners.len() != before
    }

    /// Take all snapshots flushed since the last drain, oldest first
    pub fn drain_seconds(&mut self) -> Vec<SecondSnapshot> {
        self.pending.drain(..).collect()
    }

    /// Snapshots currently waiting to be drained
    pub fn pending_seconds(&self) -> usize {
        self.pending.len()
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    /// Active parameters (post-clamp)
    pub fn params(&self) -> &SimParams {
        &self.params
    }

    /// Seed of the current run
    pub fn seed(&self) -> u32 {
        self.seed
    }

    /// Identifier of the current run; regenerated on every reset
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Continuous simulation time in seconds
    pub fn time_s(&self) -> f64 {
        self.clock.time_s()
    }

    /// Number of live sessions
    pub fn live_count(&self) -> usize {
        self.pool.live_count()
    }

    /// Read-only views of every live session
    pub fn live_sessions(&self) -> Vec<SessionView> {
        self.pool.live().iter().map(SessionView::from).collect()
    }

    /// A live session by id
    pub fn session(&self, session_id: u64) -> Option<&Session> {
        self.pool.get(session_id)
    }

    /// The current bidder pool
    pub fn bidders(&self) -> &[Bidder] {
        self.bidders.bidders()
    }

    /// Most recently flushed snapshot
    pub fn last_second(&self) -> Option<&SecondSnapshot> {
        self.last_second.as_ref()
    }

    /// Most recently flushed snapshot as JSON
    pub fn last_second_json(&self) -> Result<Option<String>, SimError> {
        match &self.last_second {
            Some(snapshot) => serde_json::to_string(snapshot)
                .map(Some)
                .map_err(|e| SimError::Serialization(e.to_string())),
            None => Ok(None),
        }
    }

    /// Rolling per-second history, oldest first
    pub fn history(&self) -> SeriesSnapshot {
        self.metrics.series().snapshot()
    }

    /// Rolling per-second history as JSON
    pub fn history_json(&self) -> Result<String, SimError> {
        serde_json::to_string(&self.history())
            .map_err(|e| SimError::Serialization(e.to_string()))
    }

    /// Seconds flushed since the last reset
    pub fn seconds_elapsed(&self) -> u64 {
        self.metrics.flushes()
    }

    /// Bounded event history
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Hex digest over every snapshot flushed so far
    ///
    /// Two runs are replays of each other exactly when their digests
    /// match at the same flush count.
    pub fn replay_digest(&self) -> String {
        let digest = self.digest.clone().finalize();
        digest.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

// Manual Debug impl: listener callbacks don't implement Debug.
impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("seed", &self.seed)
            .field("run_id", &self.run_id)
            .field("time_s", &self.clock.time_s())
            .field("live_sessions", &self.pool.live_count())
            .field("seconds_elapsed", &self.metrics.flushes())
            .field("pending_seconds", &self.pending.len())
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Parameters small enough to keep unit tests fast but busy enough
    /// to exercise every path.
    fn test_params() -> SimParams {
        SimParams {
            arrival_rate_per_s: 4.0,
            opportunity_rate_per_s: 2.0,
            ..SimParams::default()
        }
    }

    #[test]
    fn test_new_simulation_is_pristine() {
        let sim = Simulation::new(42);
        assert_eq!(sim.time_s(), 0.0);
        assert_eq!(sim.live_count(), 0);
        assert_eq!(sim.seconds_elapsed(), 0);
        assert!(sim.last_second().is_none());
        assert_eq!(sim.pending_seconds(), 0);
        // Construction records the initial reset event.
        assert_eq!(sim.events().len(), 1);
    }

    #[test]
    fn test_tick_advances_time() {
        let mut sim = Simulation::with_params(42, test_params());
        let report = sim.tick(0.1);
        assert!((report.time_s - 0.1).abs() < 1e-9);
        assert_eq!(report.seconds_flushed, 0);
        assert!((sim.time_s() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_dt_is_ignored() {
        let mut sim = Simulation::with_params(42, test_params());
        sim.tick(0.1);
        let digest = sim.replay_digest();
        let live = sim.live_count();

        for bad in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let report = sim.tick(bad);
            assert_eq!(report.arrivals, 0);
            assert_eq!(report.opportunities, 0);
        }
        assert_eq!(sim.live_count(), live);
        assert_eq!(sim.replay_digest(), digest);
        assert!((sim.time_s() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_oversized_dt_is_clamped() {
        let mut sim = Simulation::with_params(42, test_params());
        sim.tick(5.0);
        assert!((sim.time_s() - MAX_DT_S).abs() < 1e-9);
    }

    #[test]
    fn test_flush_on_second_boundary() {
        let mut sim = Simulation::with_params(42, test_params());
        for _ in 0..9 {
            let report = sim.tick(0.1);
            assert_eq!(report.seconds_flushed, 0);
        }
        let report = sim.tick(0.1);
        assert_eq!(report.seconds_flushed, 1);

        let snapshot = sim.last_second().expect("one second elapsed");
        assert_eq!(snapshot.seq, 1);
        assert_eq!(snapshot.time_s, 1.0);
        assert_eq!(sim.pending_seconds(), 1);
    }

    #[test]
    fn test_same_seed_same_digest() {
        let run = |seed: u32| {
            let mut sim = Simulation::with_params(seed, test_params());
            for _ in 0..50 {
                sim.tick(0.1);
            }
            (sim.replay_digest(), sim.drain_seconds())
        };

        let (digest_a, snaps_a) = run(7);
        let (digest_b, snaps_b) = run(7);
        assert_eq!(digest_a, digest_b);
        assert_eq!(snaps_a, snaps_b);

        let (digest_c, _) = run(8);
        assert_ne!(digest_a, digest_c);
    }

    #[test]
    fn test_run_id_differs_but_snapshots_match() {
        let mut a = Simulation::with_params(3, test_params());
        let mut b = Simulation::with_params(3, test_params());
        assert_ne!(a.run_id(), b.run_id());
        for _ in 0..30 {
            a.tick(0.1);
            b.tick(0.1);
        }
        assert_eq!(a.last_second(), b.last_second());
    }

    #[test]
    fn test_reset_restores_pristine_state() {
        let mut sim = Simulation::with_params(42, test_params());
        for _ in 0..25 {
            sim.tick(0.1);
        }
        assert!(sim.seconds_elapsed() > 0);
        let old_run_id = sim.run_id().to_string();

        sim.reset(42);
        assert_eq!(sim.time_s(), 0.0);
        assert_eq!(sim.live_count(), 0);
        assert_eq!(sim.seconds_elapsed(), 0);
        assert!(sim.last_second().is_none());
        assert_eq!(sim.pending_seconds(), 0);
        assert_ne!(sim.run_id(), old_run_id);
        assert_eq!(sim.events().len(), 1);
    }

    #[test]
    fn test_reset_replays_identically() {
        let mut sim = Simulation::with_params(9, test_params());
        for _ in 0..40 {
            sim.tick(0.1);
        }
        let first = sim.replay_digest();

        sim.reset(9);
        for _ in 0..40 {
            sim.tick(0.1);
        }
        assert_eq!(sim.replay_digest(), first);
    }

    #[test]
    fn test_set_params_records_event_and_clamps() {
        let mut sim = Simulation::with_params(42, test_params());
        let patch = SimParamsPatch {
            arrival_rate_per_s: Some(1_000.0),
            floor_price: Some(-3.0),
            ..SimParamsPatch::default()
        };
        sim.set_params(&patch);
        assert_eq!(sim.params().arrival_rate_per_s, 50.0);
        assert_eq!(sim.params().floor_price, 0.0);
        assert_eq!(sim.events().events_of_type("ParamsChanged").len(), 1);
    }

    #[test]
    fn test_empty_patch_is_noop() {
        let mut sim = Simulation::with_params(42, test_params());
        sim.set_params(&SimParamsPatch::default());
        assert!(sim.events().events_of_type("ParamsChanged").is_empty());
    }

    #[test]
    fn test_set_params_json_rejects_garbage() {
        let mut sim = Simulation::new(42);
        let err = sim.set_params_json("{not json").unwrap_err();
        assert!(matches!(err, SimError::InvalidPatch(_)));
        assert!(err.to_string().contains("invalid parameter patch"));

        sim.set_params_json(r#"{"arrival_rate_per_s": 6.5}"#).unwrap();
        assert_eq!(sim.params().arrival_rate_per_s, 6.5);
    }

    #[test]
    fn test_on_second_listener_fires_per_flush() {
        let seen: Rc<RefCell<Vec<u64>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);

        let mut sim = Simulation::with_params(42, test_params());
        let handle = sim.on_second(move |snapshot| sink.borrow_mut().push(snapshot.seq));

        for _ in 0..25 {
            sim.tick(0.1);
        }
        assert_eq!(*seen.borrow(), vec![1, 2]);

        assert!(sim.detach_second_listener(handle));
        assert!(!sim.detach_second_listener(handle));
        for _ in 0..10 {
            sim.tick(0.1);
        }
        assert_eq!(seen.borrow().len(), 2);
    }

    #[test]
    fn test_drain_seconds_empties_pending() {
        let mut sim = Simulation::with_params(42, test_params());
        for _ in 0..35 {
            sim.tick(0.1);
        }
        let drained = sim.drain_seconds();
        assert_eq!(drained.len(), 3);
        assert_eq!(drained[0].seq, 1);
        assert_eq!(drained[2].seq, 3);
        assert_eq!(sim.pending_seconds(), 0);
        assert!(sim.drain_seconds().is_empty());
    }

    #[test]
    fn test_pending_is_bounded() {
        let mut sim = Simulation::with_params(1, test_params());
        let seconds = PENDING_SECONDS_CAPACITY + 10;
        for _ in 0..seconds * 10 {
            sim.tick(0.1);
        }
        assert_eq!(sim.pending_seconds(), PENDING_SECONDS_CAPACITY);
        let drained = sim.drain_seconds();
        // Oldest snapshots were dropped, newest retained.
        assert_eq!(drained[0].seq, 11);
        assert_eq!(drained.last().map(|s| s.seq), Some(seconds as u64));
    }

    #[test]
    fn test_tick_report_accounts_for_opportunities() {
        let mut sim = Simulation::with_params(42, test_params());
        let mut fills = 0;
        let mut opportunities = 0;
        for _ in 0..100 {
            let report = sim.tick(0.1);
            fills += report.fills;
            opportunities += report.opportunities;
        }
        assert!(opportunities > 0, "busy params should produce traffic");
        assert!(fills <= opportunities);
    }

    #[test]
    fn test_json_accessors() {
        let mut sim = Simulation::with_params(42, test_params());
        assert_eq!(sim.last_second_json().unwrap(), None);
        for _ in 0..10 {
            sim.tick(0.1);
        }
        let json = sim.last_second_json().unwrap().expect("flushed");
        assert!(json.contains("\"seq\":1"));
        let history = sim.history_json().unwrap();
        assert!(history.contains("\"fills\""));
    }

    #[test]
    fn test_debug_impl_omits_callbacks() {
        let mut sim = Simulation::new(42);
        sim.on_second(|_| {});
        let rendered = format!("{:?}", sim);
        assert!(rendered.contains("Simulation"));
        assert!(rendered.contains("listeners: 1"));
    }
}
