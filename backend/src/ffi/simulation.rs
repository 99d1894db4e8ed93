//! PyO3 wrapper for Simulation
//!
//! This module provides the Python interface to the Rust engine.

use pyo3::prelude::*;
use pyo3::types::{PyDict, PyList};

use crate::core::time::{StepDriver, MAX_DT_S};
use crate::orchestrator::Simulation as RustSimulation;

use super::types::{
    event_to_py, params_to_py, parse_params, parse_patch, series_to_py, session_view_to_py,
    snapshot_to_py, snapshots_to_py, tick_report_to_py,
};

/// Ceiling on fixed steps executed per `run_frame` call, so a stalled
/// host frame cannot wedge the interpreter in a catch-up loop.
const MAX_STEPS_PER_FRAME: u32 = 32;

/// Python wrapper for the Rust simulation engine
///
/// This class is the main entry point for Python code to create and
/// drive simulations.
///
/// # Example (from Python)
///
/// ```python
/// from auction_sim._core import Simulation
///
/// sim = Simulation.new(seed=42, params={"arrival_rate_per_s": 4.0})
/// for _ in range(600):
///     sim.tick(0.1)
/// for snap in sim.drain_seconds():
///     print(snap["time_s"], snap["fill_rate_60"], snap["avg_price_60"])
/// ```
#[pyclass(name = "Simulation", unsendable)]
pub struct PySimulation {
    inner: RustSimulation,
    driver: StepDriver,
}

#[pymethods]
impl PySimulation {
    /// Create a new simulation
    ///
    /// # Arguments
    ///
    /// * `seed` - Run seed; equal seeds with equal inputs replay exactly
    /// * `params` - Optional dictionary of parameter overrides; missing
    ///   keys keep their defaults, values are clamped into range
    /// * `fixed_dt` - Step size used by `run_frame`, in (0, 0.2]
    ///
    /// # Errors
    ///
    /// Raises ValueError if a parameter fails type conversion, the
    /// policy dict is malformed, or `fixed_dt` is out of range.
    #[staticmethod]
    #[pyo3(signature = (seed, params=None, fixed_dt=0.1))]
    fn new(seed: u32, params: Option<&Bound<'_, PyDict>>, fixed_dt: f64) -> PyResult<Self> {
        if !fixed_dt.is_finite() || fixed_dt <= 0.0 || fixed_dt > MAX_DT_S {
            return Err(PyErr::new::<pyo3::exceptions::PyValueError, _>(format!(
                "fixed_dt must be in (0, {}], got {}",
                MAX_DT_S, fixed_dt
            )));
        }

        let inner = match params {
            Some(dict) => RustSimulation::with_params(seed, parse_params(dict)?),
            None => RustSimulation::new(seed),
        };

        Ok(PySimulation {
            inner,
            driver: StepDriver::new(fixed_dt, MAX_STEPS_PER_FRAME),
        })
    }

    /// Advance the simulation by one step of `dt` seconds
    ///
    /// Non-positive `dt` is ignored; `dt` above the engine maximum of
    /// 0.2 s is clamped down to it.
    ///
    /// # Returns
    ///
    /// Dictionary with the tick summary:
    /// - `time_s`: simulation time after the tick
    /// - `arrivals`, `turned_away`: sessions spawned / rejected at cap
    /// - `opportunities`, `fills`: auction traffic this tick
    /// - `exits`: sessions that ended this tick
    /// - `seconds_flushed`: KPI snapshots produced by this tick
    fn tick(&mut self, py: Python, dt: f64) -> PyResult<Py<PyDict>> {
        let report = self.inner.tick(dt);
        tick_report_to_py(py, &report)
    }

    /// Advance by a variable host frame using fixed internal steps
    ///
    /// Accumulates `frame_dt` and runs as many `fixed_dt` steps as fit,
    /// carrying the remainder to the next call. At most a bounded
    /// number of steps run per call; excess backlog is discarded so a
    /// paused host does not trigger a catch-up spiral.
    ///
    /// # Returns
    ///
    /// Dictionary with `steps`, `time_s`, and `seconds_flushed`.
    fn run_frame(&mut self, py: Python, frame_dt: f64) -> PyResult<Py<PyDict>> {
        let steps = self.driver.steps_for(frame_dt);
        let dt = self.driver.fixed_dt();

        let mut seconds_flushed = 0u32;
        for _ in 0..steps {
            seconds_flushed += self.inner.tick(dt).seconds_flushed;
        }

        let dict = PyDict::new(py);
        dict.set_item("steps", steps)?;
        dict.set_item("time_s", self.inner.time_s())?;
        dict.set_item("seconds_flushed", seconds_flushed)?;
        Ok(dict.into())
    }

    /// Restart from a pristine state under a fresh seed
    ///
    /// Current parameters are retained; any carried frame remainder is
    /// dropped.
    fn reset(&mut self, seed: u32) {
        self.driver.reset();
        self.inner.reset(seed);
    }

    /// Apply a parameter patch between ticks
    ///
    /// Only the keys present in the dict are changed; values are
    /// clamped into their documented ranges.
    ///
    /// # Example (from Python)
    ///
    /// ```python
    /// sim.set_params({"floor_price": 1.5, "policy": {"type": "fixed", "show_rate": 0.7}})
    /// ```
    fn set_params(&mut self, patch: &Bound<'_, PyDict>) -> PyResult<()> {
        let patch = parse_patch(patch)?;
        self.inner.set_params(&patch);
        Ok(())
    }

    /// Apply a parameter patch given as a JSON string
    ///
    /// # Errors
    ///
    /// Raises ValueError if the JSON is malformed.
    fn set_params_json(&mut self, json: &str) -> PyResult<()> {
        self.inner
            .set_params_json(json)
            .map_err(|e| PyErr::new::<pyo3::exceptions::PyValueError, _>(e.to_string()))
    }

    /// Active parameters after clamping
    fn params(&self, py: Python) -> PyResult<Py<PyDict>> {
        params_to_py(py, self.inner.params())
    }

    /// Current simulation time in seconds
    fn time_s(&self) -> f64 {
        self.inner.time_s()
    }

    /// Seed of the current run
    fn seed(&self) -> u32 {
        self.inner.seed()
    }

    /// Identifier of the current run; regenerated on every reset
    fn run_id(&self) -> String {
        self.inner.run_id().to_string()
    }

    /// Number of live sessions
    fn live_count(&self) -> usize {
        self.inner.live_count()
    }

    /// Whole seconds aggregated since the last reset
    fn seconds_elapsed(&self) -> u64 {
        self.inner.seconds_elapsed()
    }

    /// Take all per-second snapshots flushed since the last drain
    ///
    /// Returns a list of dictionaries, oldest first. The engine keeps
    /// at most 120 undrained snapshots; beyond that the oldest are
    /// dropped.
    fn drain_seconds(&mut self, py: Python) -> PyResult<Py<PyList>> {
        let snapshots = self.inner.drain_seconds();
        snapshots_to_py(py, &snapshots)
    }

    /// Most recently flushed per-second snapshot, or None
    fn last_second(&self, py: Python) -> PyResult<Option<Py<PyDict>>> {
        match self.inner.last_second() {
            Some(snapshot) => Ok(Some(snapshot_to_py(py, snapshot)?)),
            None => Ok(None),
        }
    }

    /// Rolling 120-second history as a dict of parallel lists
    ///
    /// # Example (from Python)
    ///
    /// ```python
    /// history = sim.history()
    /// plt.plot(history["time"], history["fills"])
    /// ```
    fn history(&self, py: Python) -> PyResult<Py<PyDict>> {
        series_to_py(py, &self.inner.history())
    }

    /// Read-only views of every live session
    fn live_sessions(&self, py: Python) -> PyResult<Py<PyList>> {
        let list = PyList::empty(py);
        for view in self.inner.live_sessions() {
            list.append(session_view_to_py(py, &view)?)?;
        }
        Ok(list.into())
    }

    /// Retained event history, oldest first
    fn events(&self, py: Python) -> PyResult<Py<PyList>> {
        let list = PyList::empty(py);
        for event in self.inner.events().iter() {
            list.append(event_to_py(py, event)?)?;
        }
        Ok(list.into())
    }

    /// Hex digest over every snapshot flushed so far
    ///
    /// Two runs are replays of each other exactly when their digests
    /// match at the same flush count.
    fn replay_digest(&self) -> String {
        self.inner.replay_digest()
    }
}
