//! Tests for the session pool lifecycle
//!
//! Exercises arrivals under the live cap, natural and hazard-driven
//! exits, fatigue decay, counter conservation across exits, and the
//! determinism of the whole pool given fixed streams.

use auction_sim_core_rs::{
    build_policy, Bidder, ExitKind, PolicyKind, RngStream, SessionExit, SessionPool, SimParams,
};
use proptest::prelude::*;

fn streams(seed: u32) -> (RngStream, RngStream, RngStream) {
    (
        RngStream::new(seed, "arrivals"),
        RngStream::new(seed, "sessions"),
        RngStream::new(seed, "auction"),
    )
}

fn bidders() -> Vec<Bidder> {
    vec![
        Bidder {
            id: 0,
            base_value: 3.0,
        },
        Bidder {
            id: 1,
            base_value: 2.0,
        },
    ]
}

/// Baseline with the gate wide open and no fill throttles
fn open_params() -> SimParams {
    SimParams {
        floor_price: 0.0,
        min_fill_gap_s: 0.0,
        max_fills_per_session: 10_000,
        policy: PolicyKind::Fixed { show_rate: 1.0 },
        ..SimParams::default()
    }
}

fn count_kind(exits: &[SessionExit], kind: ExitKind) -> usize {
    exits.iter().filter(|e| e.kind == kind).count()
}

// ============================================================================
// Arrivals and the live cap
// ============================================================================

#[test]
fn test_spawns_respect_live_cap() {
    let params = SimParams {
        arrival_rate_per_s: 50.0,
        max_live_sessions: 5,
        ..SimParams::default()
    };
    let (mut arrivals, mut lifecycle, _) = streams(1);
    let mut pool = SessionPool::new();

    let report = pool.spawn_arrivals(1.0, &params, &mut arrivals, &mut lifecycle);

    // Poisson(50) requests far more than 5 seats.
    assert_eq!(pool.live_count(), 5);
    assert_eq!(report.created.len(), 5);
    assert!(report.cap_hit());
    assert!(report.turned_away > 0);

    // A second spawn finds the pool full.
    let report = pool.spawn_arrivals(1.0, &params, &mut arrivals, &mut lifecycle);
    assert!(report.created.is_empty());
    assert_eq!(pool.live_count(), 5);
}

#[test]
fn test_turned_away_arrivals_consume_no_attribute_draws() {
    // Two pools request different arrival counts (different arrival
    // seeds) but admit the same two sessions' worth of attribute draws.
    let params = SimParams {
        arrival_rate_per_s: 20.0,
        max_live_sessions: 2,
        ..SimParams::default()
    };

    let mut arrivals_a = RngStream::new(1, "arrivals");
    let mut arrivals_b = RngStream::new(2, "arrivals");
    let mut lifecycle_a = RngStream::new(9, "sessions");
    let mut lifecycle_b = RngStream::new(9, "sessions");

    let mut pool_a = SessionPool::new();
    let mut pool_b = SessionPool::new();
    let report_a = pool_a.spawn_arrivals(1.0, &params, &mut arrivals_a, &mut lifecycle_a);
    let report_b = pool_b.spawn_arrivals(1.0, &params, &mut arrivals_b, &mut lifecycle_b);

    assert!(report_a.cap_hit());
    assert!(report_b.cap_hit());
    assert_eq!(pool_a.live(), pool_b.live());
    // The lifecycle streams are left in the same state.
    assert_eq!(lifecycle_a.next_f64(), lifecycle_b.next_f64());
}

#[test]
fn test_spawned_ids_are_monotonic() {
    let params = SimParams {
        arrival_rate_per_s: 10.0,
        max_live_sessions: 200,
        ..SimParams::default()
    };
    let (mut arrivals, mut lifecycle, _) = streams(3);
    let mut pool = SessionPool::new();

    let mut seen = Vec::new();
    for _ in 0..10 {
        let report = pool.spawn_arrivals(1.0, &params, &mut arrivals, &mut lifecycle);
        seen.extend(report.created);
    }

    assert!(!seen.is_empty());
    assert!(seen.windows(2).all(|w| w[1] == w[0] + 1));
    assert_eq!(seen[0], 1);
    assert_eq!(pool.total_spawned(), seen.len() as u64);
}

// ============================================================================
// Exits
// ============================================================================

#[test]
fn test_sessions_past_lifetime_exit_naturally() {
    // Millisecond lifetimes: one big tick outlives every session.
    let params = SimParams {
        arrival_rate_per_s: 30.0,
        max_live_sessions: 100,
        mean_session_lifetime_s: 0.001,
        opportunity_rate_per_s: 0.0,
        ..SimParams::default()
    };
    let policy = build_policy(&params.policy);
    let pool_bidders = bidders();
    let (mut arrivals, mut lifecycle, mut auction) = streams(4);
    let mut pool = SessionPool::new();

    let report = pool.spawn_arrivals(1.0, &params, &mut arrivals, &mut lifecycle);
    let spawned = report.created.len();
    assert!(spawned > 0);

    let mut outcomes = Vec::new();
    let mut exits = Vec::new();
    pool.advance_tick(
        1.0,
        &params,
        policy.as_ref(),
        &pool_bidders,
        &mut lifecycle,
        &mut auction,
        &mut outcomes,
        &mut exits,
    );

    assert_eq!(exits.len(), spawned);
    assert_eq!(count_kind(&exits, ExitKind::Natural), spawned);
    assert_eq!(pool.live_count(), 0);

    // Exited sessions are gone, but the spawn total remembers them.
    for exit in &exits {
        assert!(pool.get(exit.session_id).is_none());
    }
    assert_eq!(pool.total_spawned(), spawned as u64);
}

#[test]
fn test_fatigue_pressure_drives_early_exits() {
    // Shared base: lifetimes far beyond the run, so the base hazard is
    // negligible and early exits come from fatigue pressure alone.
    let base = SimParams {
        arrival_rate_per_s: 2.0,
        mean_session_lifetime_s: 5_000.0,
        opportunity_rate_per_s: 20.0,
        fill_increment: 1.0,
        decay_per_s: 0.0,
        tolerance_mean: 0.05,
        tolerance_sd: 0.0,
        ..open_params()
    };

    let run = |hazard_gain: f64| {
        let params = SimParams {
            hazard_gain,
            ..base.clone()
        };
        let policy = build_policy(&params.policy);
        let pool_bidders = bidders();
        let (mut arrivals, mut lifecycle, mut auction) = streams(5);
        let mut pool = SessionPool::new();
        let mut outcomes = Vec::new();
        let mut exits = Vec::new();

        for _ in 0..100 {
            pool.spawn_arrivals(0.1, &params, &mut arrivals, &mut lifecycle);
            pool.advance_tick(
                0.1,
                &params,
                policy.as_ref(),
                &pool_bidders,
                &mut lifecycle,
                &mut auction,
                &mut outcomes,
                &mut exits,
            );
        }
        count_kind(&exits, ExitKind::Early)
    };

    let pressured = run(40.0);
    let unpressured = run(0.0);
    assert!(pressured >= 10, "expected many early exits, got {pressured}");
    assert!(unpressured <= 3, "expected few early exits, got {unpressured}");
}

#[test]
fn test_exit_counters_conserve_fills_and_clicks() {
    // Run the pool until empty: every fill and click ever resolved must
    // ride out on exactly one exit record.
    let params = SimParams {
        arrival_rate_per_s: 5.0,
        mean_session_lifetime_s: 5.0,
        opportunity_rate_per_s: 10.0,
        fill_increment: 0.1,
        hazard_gain: 0.0,
        ..open_params()
    };
    let policy = build_policy(&params.policy);
    let pool_bidders = bidders();
    let (mut arrivals, mut lifecycle, mut auction) = streams(6);
    let mut pool = SessionPool::new();
    let mut outcomes = Vec::new();
    let mut exits = Vec::new();

    for _ in 0..50 {
        pool.spawn_arrivals(0.2, &params, &mut arrivals, &mut lifecycle);
        pool.advance_tick(
            0.2,
            &params,
            policy.as_ref(),
            &pool_bidders,
            &mut lifecycle,
            &mut auction,
            &mut outcomes,
            &mut exits,
        );
    }

    // Drain: no more arrivals, no more opportunities, big quiet ticks.
    let quiet = SimParams {
        opportunity_rate_per_s: 0.0,
        ..params.clone()
    };
    let mut rounds = 0;
    while pool.live_count() > 0 {
        pool.advance_tick(
            10.0,
            &quiet,
            policy.as_ref(),
            &pool_bidders,
            &mut lifecycle,
            &mut auction,
            &mut outcomes,
            &mut exits,
        );
        rounds += 1;
        assert!(rounds < 100, "pool failed to drain");
    }

    let filled = outcomes.iter().filter(|o| o.cleared).count() as u32;
    let clicked = outcomes.iter().filter(|o| o.clicked).count() as u32;
    assert!(filled > 0);
    assert_eq!(exits.iter().map(|e| e.fills).sum::<u32>(), filled);
    assert_eq!(exits.iter().map(|e| e.clicks).sum::<u32>(), clicked);
}

// ============================================================================
// Fatigue decay
// ============================================================================

#[test]
fn test_fatigue_decays_to_zero_when_quiet() {
    // Phase 1 builds fatigue with dense fills; phase 2 starves the pool
    // of opportunities and lets decay run past the maximum accumulation.
    let busy = SimParams {
        arrival_rate_per_s: 5.0,
        mean_session_lifetime_s: 10_000.0,
        opportunity_rate_per_s: 20.0,
        fill_increment: 0.5,
        max_fills_per_session: 10,
        decay_per_s: 0.0,
        hazard_gain: 0.0,
        ..open_params()
    };
    let policy = build_policy(&busy.policy);
    let pool_bidders = bidders();
    let (mut arrivals, mut lifecycle, mut auction) = streams(7);
    let mut pool = SessionPool::new();
    let mut outcomes = Vec::new();
    let mut exits = Vec::new();

    for _ in 0..20 {
        pool.spawn_arrivals(0.5, &busy, &mut arrivals, &mut lifecycle);
        pool.advance_tick(
            0.5,
            &busy,
            policy.as_ref(),
            &pool_bidders,
            &mut lifecycle,
            &mut auction,
            &mut outcomes,
            &mut exits,
        );
    }
    assert!(pool.live_count() > 0);
    assert!(pool.live().iter().any(|s| s.fatigue() > 0.0));

    // Max possible fatigue is 10 fills x 0.5; 20 s at 0.5/s clears it.
    let quiet = SimParams {
        opportunity_rate_per_s: 0.0,
        decay_per_s: 0.5,
        ..busy.clone()
    };
    for _ in 0..40 {
        pool.advance_tick(
            0.5,
            &quiet,
            policy.as_ref(),
            &pool_bidders,
            &mut lifecycle,
            &mut auction,
            &mut outcomes,
            &mut exits,
        );
    }
    let stats = pool.advance_tick(
        0.5,
        &quiet,
        policy.as_ref(),
        &pool_bidders,
        &mut lifecycle,
        &mut auction,
        &mut outcomes,
        &mut exits,
    );

    assert!(pool.live_count() > 0);
    assert!(pool.live().iter().all(|s| s.fatigue() == 0.0));
    assert_eq!(stats.fatigue_sum, 0.0);
}

// ============================================================================
// Reset and determinism
// ============================================================================

#[test]
fn test_reset_clears_pool_and_restarts_ids() {
    let params = SimParams::default();
    let (mut arrivals, mut lifecycle, _) = streams(8);
    let mut pool = SessionPool::new();

    pool.spawn_arrivals(2.0, &params, &mut arrivals, &mut lifecycle);
    assert!(pool.live_count() > 0);

    pool.reset();
    assert_eq!(pool.live_count(), 0);
    assert_eq!(pool.total_spawned(), 0);

    let report = pool.spawn_arrivals(2.0, &params, &mut arrivals, &mut lifecycle);
    assert_eq!(report.created[0], 1);
}

#[test]
fn test_pool_evolution_is_deterministic() {
    let params = open_params();
    let run = |seed: u32| {
        let policy = build_policy(&params.policy);
        let pool_bidders = bidders();
        let (mut arrivals, mut lifecycle, mut auction) = streams(seed);
        let mut pool = SessionPool::new();
        let mut outcomes = Vec::new();
        let mut exits = Vec::new();
        for _ in 0..80 {
            pool.spawn_arrivals(0.1, &params, &mut arrivals, &mut lifecycle);
            pool.advance_tick(
                0.1,
                &params,
                policy.as_ref(),
                &pool_bidders,
                &mut lifecycle,
                &mut auction,
                &mut outcomes,
                &mut exits,
            );
        }
        (pool.live().to_vec(), outcomes, exits)
    };

    assert_eq!(run(42), run(42));
    assert_ne!(run(42).0, run(43).0);
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_pool_respects_cap_and_fatigue_floor(seed in 0u32..10_000, ticks in 1usize..50) {
        let params = SimParams {
            arrival_rate_per_s: 8.0,
            max_live_sessions: 20,
            ..SimParams::default()
        };
        let policy = build_policy(&params.policy);
        let pool_bidders = bidders();
        let (mut arrivals, mut lifecycle, mut auction) = streams(seed);
        let mut pool = SessionPool::new();
        let mut outcomes = Vec::new();
        let mut exits = Vec::new();

        for _ in 0..ticks {
            pool.spawn_arrivals(0.1, &params, &mut arrivals, &mut lifecycle);
            pool.advance_tick(
                0.1,
                &params,
                policy.as_ref(),
                &pool_bidders,
                &mut lifecycle,
                &mut auction,
                &mut outcomes,
                &mut exits,
            );
            prop_assert!(pool.live_count() <= params.max_live_sessions);
            prop_assert!(pool.live().iter().all(|s| s.fatigue() >= 0.0));
        }
        prop_assert!(pool.total_spawned() >= pool.live_count() as u64);
    }
}
