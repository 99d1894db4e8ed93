//! Domain models for the auction pressure simulator

pub mod bidder;
pub mod event;
pub mod outcome;
pub mod session;

// Re-exports
pub use bidder::{Bidder, BidderPool};
pub use event::{Event, EventLog};
pub use outcome::{AuctionOutcome, ExitKind, NoFillReason};
pub use session::{Session, SessionView};
