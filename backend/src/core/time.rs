//! Time management for the simulation
//!
//! The simulation advances in variable-size steps capped at
//! [`MAX_DT_S`]. Elapsed time is tracked in integer microseconds so
//! that repeated fractional steps (e.g. ten steps of 0.1s) land exactly
//! on whole-second boundaries instead of drifting through float
//! accumulation.

use serde::{Deserialize, Serialize};

/// Largest step, in seconds, a single tick may advance.
pub const MAX_DT_S: f64 = 0.2;

const MICROS_PER_SECOND: u64 = 1_000_000;

/// Tracks elapsed simulation time and whole-second boundary crossings
///
/// # Example
/// ```
/// use auction_sim_core_rs::SimClock;
///
/// let mut clock = SimClock::new();
/// for _ in 0..9 {
///     assert_eq!(clock.advance(0.1), 0);
/// }
/// assert_eq!(clock.advance(0.1), 1); // tenth step crosses 1.0s exactly
/// assert_eq!(clock.completed_seconds(), 1);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimClock {
    /// Elapsed simulation time in microseconds
    elapsed_us: u64,
    /// Whole seconds already reported as crossed
    reported_s: u64,
}

impl SimClock {
    /// Create a clock at t = 0
    pub fn new() -> Self {
        Self {
            elapsed_us: 0,
            reported_s: 0,
        }
    }

    /// Advance by `dt` seconds, returning how many whole-second
    /// boundaries this step crossed (0 with small steps, at most 1 while
    /// `dt` respects [`MAX_DT_S`])
    ///
    /// Steps smaller than one microsecond are lost to rounding.
    pub fn advance(&mut self, dt: f64) -> u32 {
        debug_assert!(dt > 0.0 && dt <= MAX_DT_S, "dt out of range: {}", dt);
        let step_us = (dt * MICROS_PER_SECOND as f64).round() as u64;
        self.elapsed_us = self.elapsed_us.saturating_add(step_us);

        let completed = self.elapsed_us / MICROS_PER_SECOND;
        let crossed = completed - self.reported_s;
        self.reported_s = completed;
        crossed as u32
    }

    /// Elapsed simulation time in seconds
    pub fn time_s(&self) -> f64 {
        self.elapsed_us as f64 / MICROS_PER_SECOND as f64
    }

    /// Whole seconds fully elapsed since start
    pub fn completed_seconds(&self) -> u64 {
        self.reported_s
    }

    /// Rewind to t = 0
    pub fn reset(&mut self) {
        self.elapsed_us = 0;
        self.reported_s = 0;
    }
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed-step frame driver with a catch-up cap
///
/// Hosts running against wall-clock frames feed their frame delta in;
/// the driver converts it into a whole number of fixed-size simulation
/// steps, carrying the remainder. The accumulator is kept in integer
/// microseconds for the same reason the clock is, so carries combine
/// exactly. When a stall would require more than `max_steps_per_frame`
/// catch-up steps, the backlog is discarded: the simulation loses
/// wall-clock time rather than spiraling into ever longer frames.
///
/// # Example
/// ```
/// use auction_sim_core_rs::StepDriver;
///
/// let mut driver = StepDriver::new(0.1, 25);
/// assert_eq!(driver.steps_for(0.25), 2); // 0.05s carried over
/// assert_eq!(driver.steps_for(0.05), 1); // carry + frame = one step
/// assert_eq!(driver.steps_for(10.0), 25); // stall: capped, backlog dropped
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDriver {
    /// Size of one simulation step in microseconds
    step_us: u64,
    /// Catch-up cap per frame
    max_steps_per_frame: u32,
    /// Unconsumed frame time in microseconds
    accumulator_us: u64,
}

impl StepDriver {
    /// Create a driver producing steps of `fixed_dt` seconds
    ///
    /// # Panics
    /// Panics if `fixed_dt` is outside (0, [`MAX_DT_S`]] or
    /// `max_steps_per_frame` is zero.
    pub fn new(fixed_dt: f64, max_steps_per_frame: u32) -> Self {
        assert!(
            fixed_dt > 0.0 && fixed_dt <= MAX_DT_S,
            "fixed_dt must be in (0, {}]",
            MAX_DT_S
        );
        assert!(max_steps_per_frame > 0, "max_steps_per_frame must be positive");
        let step_us = (fixed_dt * MICROS_PER_SECOND as f64).round() as u64;
        assert!(step_us > 0, "fixed_dt must be at least one microsecond");
        Self {
            step_us,
            max_steps_per_frame,
            accumulator_us: 0,
        }
    }

    /// Convert a frame delta into a number of fixed steps to run
    ///
    /// Non-finite or non-positive frame deltas produce zero steps and
    /// leave the accumulator untouched.
    pub fn steps_for(&mut self, frame_dt: f64) -> u32 {
        if !frame_dt.is_finite() || frame_dt <= 0.0 {
            return 0;
        }
        // Saturating cast, so absurd frame deltas cannot overflow.
        let frame_us = (frame_dt * MICROS_PER_SECOND as f64).round() as u64;
        self.accumulator_us = self.accumulator_us.saturating_add(frame_us);

        let steps = self.accumulator_us / self.step_us;
        if steps > self.max_steps_per_frame as u64 {
            self.accumulator_us = 0;
            self.max_steps_per_frame
        } else {
            self.accumulator_us -= steps * self.step_us;
            steps as u32
        }
    }

    /// Size of one simulation step in seconds
    pub fn fixed_dt(&self) -> f64 {
        self.step_us as f64 / MICROS_PER_SECOND as f64
    }

    /// Drop any carried remainder
    pub fn reset(&mut self) {
        self.accumulator_us = 0;
    }
}
