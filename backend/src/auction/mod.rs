//! Second-price auction and opportunity resolution
//!
//! This module implements the allocation mechanism that resolves each
//! ad opportunity.
//!
//! # Resolution Flow
//!
//! ```text
//! Opportunity → fill cap → min gap → policy gate → auction vs floor → fill
//!                  ↓           ↓          ↓               ↓
//!               NoFill      NoFill     NoFill          NoFill
//!              (fill_cap)  (min_gap)  (policy)         (floor)
//! ```
//!
//! Checks run in the fixed order above, and a rejection is attributed
//! to the FIRST failing check only, so reason counts partition the
//! misses exactly.
//!
//! # Critical Invariants
//!
//! - **Second-price law**: the winner pays max(second-highest effective
//!   bid, floor), never their own bid
//! - **Floor**: a clearing price is never below the floor, and a top
//!   bid below the floor never clears
//! - **Attribution**: every rejected opportunity carries exactly one
//!   reason

use crate::config::SimParams;
use crate::models::bidder::Bidder;
use crate::models::outcome::{AuctionOutcome, NoFillReason};
use crate::models::session::Session;
use crate::policy::GatePolicy;
use crate::rng::RngStream;

/// Result of a cleared auction, before click sampling
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Clearing {
    /// Winning bidder id
    pub winner_id: u32,
    /// Price paid: max(second-highest effective bid, floor)
    pub price: f64,
    /// The winner's own effective bid (for diagnostics; never paid)
    pub top_value: f64,
}

/// Run a second-price auction over effective bids
///
/// Effective bid = base value × session quality multiplier. Returns
/// None when no bid reaches the floor (or there are no bidders); the
/// caller attributes that to [`NoFillReason::Floor`].
///
/// Ties on the top bid go to the earliest bidder in pool order, and the
/// price then equals the tied value.
///
/// # Example
/// ```
/// use auction_sim_core_rs::auction::clear_second_price;
/// use auction_sim_core_rs::Bidder;
///
/// let bidders = [
///     Bidder { id: 0, base_value: 10.0 },
///     Bidder { id: 1, base_value: 7.0 },
///     Bidder { id: 2, base_value: 3.0 },
/// ];
/// let clearing = clear_second_price(&bidders, 1.0, 2.0).unwrap();
/// assert_eq!(clearing.winner_id, 0);
/// assert_eq!(clearing.price, 7.0); // second-highest, above floor
/// ```
pub fn clear_second_price(
    bidders: &[Bidder],
    quality_multiplier: f64,
    floor_price: f64,
) -> Option<Clearing> {
    let mut top: Option<(u32, f64)> = None;
    let mut second: Option<f64> = None;

    for bidder in bidders {
        let effective = bidder.base_value * quality_multiplier;
        match top {
            Some((_, top_value)) if effective > top_value => {
                second = Some(top_value);
                top = Some((bidder.id, effective));
            }
            Some(_) => {
                if second.map_or(true, |s| effective > s) {
                    second = Some(effective);
                }
            }
            None => top = Some((bidder.id, effective)),
        }
    }

    let (winner_id, top_value) = top?;
    if top_value < floor_price {
        return None;
    }

    let price = second.map_or(floor_price, |s| s.max(floor_price));
    Some(Clearing {
        winner_id,
        price,
        top_value,
    })
}

/// Resolve one ad opportunity for a session
///
/// Runs the check chain, and on a fill samples the click, bumps the
/// session's fill counter and fatigue, and returns the cleared outcome.
/// The click is sampled against the session's CTR as it was BEFORE this
/// fill's fatigue increment lands.
pub fn resolve_opportunity(
    session: &mut Session,
    params: &SimParams,
    policy: &dyn GatePolicy,
    bidders: &[Bidder],
    rng: &mut RngStream,
) -> AuctionOutcome {
    // 1. Lifetime fill cap
    if session.fills() >= params.max_fills_per_session {
        return AuctionOutcome::rejected(session.id(), NoFillReason::FillCap);
    }

    // 2. Minimum gap since the previous fill
    if let Some(gap) = session.gap_since_last_fill() {
        if gap < params.min_fill_gap_s {
            return AuctionOutcome::rejected(session.id(), NoFillReason::MinGap);
        }
    }

    // 3. Show/suppress gate
    let p_show = policy
        .show_probability(session.fatigue(), session.tolerance())
        .clamp(0.0, 1.0);
    if !rng.chance(p_show) {
        return AuctionOutcome::rejected(session.id(), NoFillReason::Policy);
    }

    // 4. Auction against the floor
    let quality = session.quality_multiplier(params.quality_penalty);
    match clear_second_price(bidders, quality, params.floor_price) {
        None => AuctionOutcome::rejected(session.id(), NoFillReason::Floor),
        Some(clearing) => {
            let ctr = session.effective_ctr(params.base_ctr, params.ctr_penalty);
            let clicked = rng.chance(ctr);

            session.record_fill(params.fill_increment);
            if clicked {
                session.record_click();
            }

            AuctionOutcome::filled(
                session.id(),
                clearing.price,
                quality,
                clearing.winner_id,
                clicked,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PolicyKind;
    use crate::policy::build_policy;

    fn bidders(values: &[f64]) -> Vec<Bidder> {
        values
            .iter()
            .enumerate()
            .map(|(id, &base_value)| Bidder {
                id: id as u32,
                base_value,
            })
            .collect()
    }

    #[test]
    fn test_second_price_pays_second_highest() {
        let pool = bidders(&[10.0, 7.0, 3.0]);
        let clearing = clear_second_price(&pool, 1.0, 2.0).unwrap();
        assert_eq!(clearing.winner_id, 0);
        assert_eq!(clearing.price, 7.0);
        assert_eq!(clearing.top_value, 10.0);
    }

    #[test]
    fn test_single_bidder_pays_floor() {
        let pool = bidders(&[10.0]);
        let clearing = clear_second_price(&pool, 1.0, 2.0).unwrap();
        assert_eq!(clearing.winner_id, 0);
        assert_eq!(clearing.price, 2.0);
    }

    #[test]
    fn test_floor_dominates_low_second_bid() {
        let pool = bidders(&[10.0, 0.5]);
        let clearing = clear_second_price(&pool, 1.0, 2.0).unwrap();
        assert_eq!(clearing.price, 2.0);
    }

    #[test]
    fn test_top_below_floor_does_not_clear() {
        let pool = bidders(&[1.5, 1.0]);
        assert_eq!(clear_second_price(&pool, 1.0, 2.0), None);
    }

    #[test]
    fn test_no_bidders_does_not_clear() {
        assert_eq!(clear_second_price(&[], 1.0, 0.0), None);
    }

    #[test]
    fn test_tie_goes_to_earliest_bidder_at_tied_price() {
        let pool = bidders(&[8.0, 8.0, 3.0]);
        let clearing = clear_second_price(&pool, 1.0, 1.0).unwrap();
        assert_eq!(clearing.winner_id, 0);
        assert_eq!(clearing.price, 8.0);
    }

    #[test]
    fn test_quality_scales_bids_into_floor_rejection() {
        let pool = bidders(&[10.0, 7.0]);
        // quality 0.1 drags the top effective bid to 1.0, under the floor
        assert_eq!(clear_second_price(&pool, 0.1, 2.0), None);
    }

    #[test]
    fn test_winner_never_pays_own_bid_with_two_distinct() {
        let pool = bidders(&[9.0, 4.0]);
        let clearing = clear_second_price(&pool, 1.0, 0.0).unwrap();
        assert!(clearing.price < clearing.top_value);
        assert_eq!(clearing.price, 4.0);
    }

    #[test]
    fn test_resolution_respects_fill_cap_first() {
        let mut params = SimParams::default();
        params.max_fills_per_session = 0;
        let policy = build_policy(&PolicyKind::Fixed { show_rate: 1.0 });
        let pool = bidders(&[10.0, 7.0]);
        let mut session = Session::new(1, 45.0, 1.2);
        let mut rng = RngStream::new(1, "auction");

        let outcome = resolve_opportunity(&mut session, &params, policy.as_ref(), &pool, &mut rng);
        assert_eq!(outcome.reason, Some(NoFillReason::FillCap));
        assert_eq!(session.fills(), 0);
    }

    #[test]
    fn test_resolution_min_gap_blocks_immediate_refill() {
        let mut params = SimParams::default();
        params.min_fill_gap_s = 2.0;
        params.floor_price = 0.0;
        let policy = build_policy(&PolicyKind::Fixed { show_rate: 1.0 });
        let pool = bidders(&[10.0, 7.0]);
        let mut session = Session::new(1, 45.0, 1.2);
        let mut rng = RngStream::new(1, "auction");

        let first = resolve_opportunity(&mut session, &params, policy.as_ref(), &pool, &mut rng);
        assert!(first.cleared);

        // Same instant: gap is 0.0 < 2.0
        let second = resolve_opportunity(&mut session, &params, policy.as_ref(), &pool, &mut rng);
        assert_eq!(second.reason, Some(NoFillReason::MinGap));

        // After the gap passes, fills are possible again.
        session.advance_age(2.0);
        let third = resolve_opportunity(&mut session, &params, policy.as_ref(), &pool, &mut rng);
        assert!(third.cleared);
    }

    #[test]
    fn test_resolution_closed_gate_attributes_policy() {
        let params = SimParams::default();
        let policy = build_policy(&PolicyKind::Fixed { show_rate: 0.0 });
        let pool = bidders(&[10.0, 7.0]);
        let mut session = Session::new(1, 45.0, 1.2);
        let mut rng = RngStream::new(1, "auction");

        let outcome = resolve_opportunity(&mut session, &params, policy.as_ref(), &pool, &mut rng);
        assert_eq!(outcome.reason, Some(NoFillReason::Policy));
    }

    #[test]
    fn test_resolution_fill_mutates_session() {
        let mut params = SimParams::default();
        params.floor_price = 0.0;
        let policy = build_policy(&PolicyKind::Fixed { show_rate: 1.0 });
        let pool = bidders(&[10.0, 7.0]);
        let mut session = Session::new(1, 45.0, 1.2);
        let mut rng = RngStream::new(1, "auction");

        let outcome = resolve_opportunity(&mut session, &params, policy.as_ref(), &pool, &mut rng);
        assert!(outcome.cleared);
        assert_eq!(outcome.price, 7.0);
        assert_eq!(session.fills(), 1);
        assert!((session.fatigue() - params.fill_increment).abs() < 1e-12);
        assert_eq!(session.gap_since_last_fill(), Some(0.0));
    }
}
