//! Labeled xorshift64* random number stream with simulation samplers
//!
//! The stream state is derived by hashing a (seed, label) pair with
//! SHA-256 and taking the first 8 bytes. Two streams created from the
//! same seed but different labels are statistically independent, while
//! the same (seed, label) pair always reproduces the same sequence.
//!
//! # Algorithm
//!
//! xorshift64* is a variant of xorshift that passes TestU01's BigCrush
//! statistical tests. It uses 64-bit state and produces 64-bit output.
//!
//! # Determinism
//!
//! Same seed + label → same sequence of random numbers. This is CRITICAL for:
//! - Debugging (reproduce exact simulation)
//! - Testing (verify behavior)
//! - Research (validate results)

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Above this mean the Poisson sampler switches from exact inversion to
/// a rounded normal approximation, keeping draw cost bounded.
const POISSON_INVERSION_MAX_MEAN: f64 = 12.0;

/// Rejection attempts before `truncated_normal` falls back to clamping.
const TRUNCATED_NORMAL_ATTEMPTS: u32 = 6;

/// Deterministic random number stream using xorshift64*
///
/// # Example
/// ```
/// use auction_sim_core_rs::RngStream;
///
/// let mut rng = RngStream::new(12345, "arrivals");
/// let uniform = rng.next_f64();          // [0.0, 1.0)
/// let count = rng.poisson(0.4);          // arrivals this tick
/// assert!(uniform >= 0.0 && uniform < 1.0);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RngStream {
    /// Internal state (64-bit)
    state: u64,
    /// Times `truncated_normal` exhausted its rejection attempts and clamped
    clamp_fallbacks: u64,
}

impl RngStream {
    /// Create a new stream for a given seed and subsystem label
    ///
    /// # Arguments
    /// * `seed` - Run seed shared by all streams of one simulation
    /// * `label` - Stable subsystem name, e.g. `"arrivals"` or `"auction"`
    ///
    /// # Example
    /// ```
    /// use auction_sim_core_rs::RngStream;
    ///
    /// let a = RngStream::new(7, "arrivals");
    /// let b = RngStream::new(7, "auction");
    /// // Same seed, different labels: independent sequences.
    /// ```
    pub fn new(seed: u32, label: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(seed.to_le_bytes());
        hasher.update(label.as_bytes());
        let digest = hasher.finalize();

        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        let state = u64::from_le_bytes(bytes);

        // Ensure state is never zero (xorshift requirement)
        let state = if state == 0 { 1 } else { state };
        Self {
            state,
            clamp_fallbacks: 0,
        }
    }

    /// Generate next random u64 value
    ///
    /// This advances the internal state and returns a random value.
    pub fn next_u64(&mut self) -> u64 {
        // xorshift64* algorithm
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }

    /// Generate random f64 in range [0.0, 1.0)
    ///
    /// # Example
    /// ```
    /// use auction_sim_core_rs::RngStream;
    ///
    /// let mut rng = RngStream::new(12345, "test");
    /// let probability = rng.next_f64();
    /// assert!(probability >= 0.0 && probability < 1.0);
    /// ```
    pub fn next_f64(&mut self) -> f64 {
        let value = self.next_u64();
        // Convert to [0.0, 1.0) using the top 53 bits
        (value >> 11) as f64 * (1.0 / ((1u64 << 53) as f64))
    }

    /// Bernoulli trial: returns true with probability `p`
    ///
    /// Values of `p` at or below 0.0 never fire; at or above 1.0 always fire.
    pub fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// Get current stream state (for diagnostics)
    pub fn state(&self) -> u64 {
        self.state
    }

    /// Sample from a Poisson distribution with the given mean
    ///
    /// Uses Knuth's exact inversion for small means and a rounded normal
    /// approximation (mean λ, standard deviation √λ, floored at zero) for
    /// large means so a single draw never loops unboundedly.
    ///
    /// # Arguments
    /// * `mean` - Expected count (λ); non-positive means yield 0
    ///
    /// # Example
    /// ```
    /// use auction_sim_core_rs::RngStream;
    ///
    /// let mut rng = RngStream::new(1, "arrivals");
    /// let arrivals = rng.poisson(4.0 * 0.1); // rate 4/s over dt = 0.1s
    /// assert!(arrivals < 100);
    /// ```
    pub fn poisson(&mut self, mean: f64) -> u32 {
        if !mean.is_finite() || mean <= 0.0 {
            return 0;
        }

        if mean <= POISSON_INVERSION_MAX_MEAN {
            // Knuth inversion: count uniforms until their product drops
            // below e^-mean.
            let limit = (-mean).exp();
            let mut count = 0u32;
            let mut product = self.next_f64();
            while product > limit {
                count += 1;
                product *= self.next_f64();
            }
            count
        } else {
            let approx = mean + mean.sqrt() * self.standard_normal();
            approx.round().max(0.0) as u32
        }
    }

    /// Sample from the standard normal distribution N(0, 1)
    ///
    /// Box-Muller transform over two uniforms.
    pub fn standard_normal(&mut self) -> f64 {
        // Guard the log argument away from zero.
        let u1 = self.next_f64().max(1e-12);
        let u2 = self.next_f64();
        (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
    }

    /// Sample from N(mean, sd) truncated to [lo, hi]
    ///
    /// Rejection-samples a handful of times, then clamps the last draw
    /// into range and counts the fallback (see [`clamp_fallbacks`]).
    /// A non-positive `sd` collapses to `mean` clamped into range.
    ///
    /// [`clamp_fallbacks`]: RngStream::clamp_fallbacks
    ///
    /// # Example
    /// ```
    /// use auction_sim_core_rs::RngStream;
    ///
    /// let mut rng = RngStream::new(3, "sessions");
    /// let tolerance = rng.truncated_normal(1.2, 0.4, 0.05, 10.0);
    /// assert!(tolerance >= 0.05 && tolerance <= 10.0);
    /// ```
    pub fn truncated_normal(&mut self, mean: f64, sd: f64, lo: f64, hi: f64) -> f64 {
        debug_assert!(lo <= hi, "truncated_normal bounds inverted");
        if sd <= 0.0 {
            return mean.clamp(lo, hi);
        }

        let mut value = mean + sd * self.standard_normal();
        for _ in 1..TRUNCATED_NORMAL_ATTEMPTS {
            if value >= lo && value <= hi {
                return value;
            }
            value = mean + sd * self.standard_normal();
        }
        if value >= lo && value <= hi {
            return value;
        }

        self.clamp_fallbacks += 1;
        value.clamp(lo, hi)
    }

    /// Sample from an exponential distribution with the given mean
    ///
    /// Inverse-transform sampling; the log argument is kept away from
    /// zero so the result is always finite.
    ///
    /// # Arguments
    /// * `mean` - Expected value (1/rate); non-positive means yield 0.0
    pub fn exponential(&mut self, mean: f64) -> f64 {
        if !mean.is_finite() || mean <= 0.0 {
            return 0.0;
        }
        let u = self.next_f64();
        -((1.0 - u).max(1e-12)).ln() * mean
    }

    /// Sample from a log-normal distribution with a target arithmetic mean
    ///
    /// The underlying normal's μ is shifted by −σ²/2 so that the expected
    /// value of the samples equals `target_mean` rather than e^μ alone.
    ///
    /// # Arguments
    /// * `target_mean` - Desired arithmetic mean of the samples (floored at 1e-9)
    /// * `sigma` - Log-space standard deviation; non-positive yields `target_mean`
    pub fn log_normal_mean(&mut self, target_mean: f64, sigma: f64) -> f64 {
        let target_mean = target_mean.max(1e-9);
        if sigma <= 0.0 {
            return target_mean;
        }
        let mu = target_mean.ln() - 0.5 * sigma * sigma;
        (mu + sigma * self.standard_normal()).exp()
    }

    /// Times `truncated_normal` fell back to clamping since creation
    ///
    /// Surfaced in snapshots so heavy clamping (a sign of badly chosen
    /// bounds) is visible instead of silent.
    pub fn clamp_fallbacks(&self) -> u64 {
        self.clamp_fallbacks
    }
}
