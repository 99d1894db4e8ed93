//! Deterministic random number generation
//!
//! Uses xorshift64* streams seeded by hashing (seed, label) pairs.
//! CRITICAL: All randomness in the simulator MUST go through this module.
//!
//! Each subsystem (arrivals, sessions, auction, metrics) owns its own
//! labeled stream, so draws made by one subsystem never shift the
//! sequence another subsystem sees.

mod stream;

pub use stream::RngStream;
