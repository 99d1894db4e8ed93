//! Auction opportunity outcomes
//!
//! Every ad opportunity resolves to exactly one outcome: a fill with a
//! clearing price, or a rejection tagged with the first check that
//! failed. Checks run in a fixed order (fill cap, minimum gap, policy
//! gate, floor), so rejection counts attribute each miss to a single
//! cause and sum up cleanly against opportunity totals.

use serde::{Deserialize, Serialize};

/// First check that rejected an opportunity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoFillReason {
    /// Session already reached its lifetime fill cap
    FillCap,
    /// Too soon after the previous fill
    MinGap,
    /// Suppressed by the show/suppress gate
    Policy,
    /// Auction cleared below the floor price (or had no bidders)
    Floor,
}

/// How a session left the simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitKind {
    /// Reached its sampled natural lifetime
    Natural,
    /// Left early via the fatigue-driven hazard
    Early,
}

/// Resolution of a single ad opportunity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuctionOutcome {
    /// Session the opportunity belonged to
    pub session_id: u64,
    /// True when the auction cleared and the ad was delivered
    pub cleared: bool,
    /// Clearing price paid by the winner (0.0 on rejection)
    pub price: f64,
    /// Session quality multiplier in effect at clearing time (0.0 on rejection)
    pub winner_quality: f64,
    /// Winning bidder id, None on rejection
    pub winner_id: Option<u32>,
    /// True when the delivered ad was clicked
    pub clicked: bool,
    /// Why the opportunity missed, None on a fill
    pub reason: Option<NoFillReason>,
}

impl AuctionOutcome {
    /// Construct a cleared outcome
    pub fn filled(session_id: u64, price: f64, winner_quality: f64, winner_id: u32, clicked: bool) -> Self {
        Self {
            session_id,
            cleared: true,
            price,
            winner_quality,
            winner_id: Some(winner_id),
            clicked,
            reason: None,
        }
    }

    /// Construct a rejected outcome tagged with its cause
    pub fn rejected(session_id: u64, reason: NoFillReason) -> Self {
        Self {
            session_id,
            cleared: false,
            price: 0.0,
            winner_quality: 0.0,
            winner_id: None,
            clicked: false,
            reason: Some(reason),
        }
    }
}
