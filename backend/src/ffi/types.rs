//! Type conversion utilities for FFI boundary
//!
//! Converts between Rust types and PyO3-compatible types (PyDict, PyList, etc.)

use pyo3::prelude::*;
use pyo3::types::{PyDict, PyList};

use crate::config::{PolicyKind, SimParams, SimParamsPatch};
use crate::metrics::{NoFillBreakdown, SecondSnapshot, SeriesSnapshot};
use crate::models::{Event, SessionView};
use crate::orchestrator::TickReport;

// ========================================================================
// PyDict Extraction Helpers
// ========================================================================

/// Extract an optional field from a Python dict.
///
/// Returns `Some(value)` if the field exists, `None` if missing; errors
/// only when a present value fails type conversion.
fn extract_optional<'py, T>(dict: &Bound<'py, PyDict>, key: &str) -> PyResult<Option<T>>
where
    T: FromPyObject<'py>,
{
    match dict.get_item(key)? {
        Some(value) => Ok(Some(value.extract()?)),
        None => Ok(None),
    }
}

/// Extract a field with a default value if missing.
fn extract_with_default<'py, T>(dict: &Bound<'py, PyDict>, key: &str, default: T) -> PyResult<T>
where
    T: FromPyObject<'py>,
{
    match dict.get_item(key)? {
        Some(value) => value.extract(),
        None => Ok(default),
    }
}

fn value_error(msg: String) -> PyErr {
    PyErr::new::<pyo3::exceptions::PyValueError, _>(msg)
}

// ========================================================================
// Configuration Parsers
// ========================================================================

/// Convert a Python dict to a full parameter set
///
/// Missing fields keep their defaults; values are clamped into range by
/// the engine on use.
pub fn parse_params(dict: &Bound<'_, PyDict>) -> PyResult<SimParams> {
    let d = SimParams::default();
    Ok(SimParams {
        arrival_rate_per_s: extract_with_default(dict, "arrival_rate_per_s", d.arrival_rate_per_s)?,
        max_live_sessions: extract_with_default(dict, "max_live_sessions", d.max_live_sessions)?,
        mean_session_lifetime_s: extract_with_default(
            dict,
            "mean_session_lifetime_s",
            d.mean_session_lifetime_s,
        )?,
        opportunity_rate_per_s: extract_with_default(
            dict,
            "opportunity_rate_per_s",
            d.opportunity_rate_per_s,
        )?,
        tolerance_mean: extract_with_default(dict, "tolerance_mean", d.tolerance_mean)?,
        tolerance_sd: extract_with_default(dict, "tolerance_sd", d.tolerance_sd)?,
        decay_per_s: extract_with_default(dict, "decay_per_s", d.decay_per_s)?,
        fill_increment: extract_with_default(dict, "fill_increment", d.fill_increment)?,
        hazard_gain: extract_with_default(dict, "hazard_gain", d.hazard_gain)?,
        base_ctr: extract_with_default(dict, "base_ctr", d.base_ctr)?,
        ctr_penalty: extract_with_default(dict, "ctr_penalty", d.ctr_penalty)?,
        quality_penalty: extract_with_default(dict, "quality_penalty", d.quality_penalty)?,
        bidder_count: extract_with_default(dict, "bidder_count", d.bidder_count)?,
        bid_mean: extract_with_default(dict, "bid_mean", d.bid_mean)?,
        bid_sigma: extract_with_default(dict, "bid_sigma", d.bid_sigma)?,
        floor_price: extract_with_default(dict, "floor_price", d.floor_price)?,
        take_rate: extract_with_default(dict, "take_rate", d.take_rate)?,
        max_fills_per_session: extract_with_default(
            dict,
            "max_fills_per_session",
            d.max_fills_per_session,
        )?,
        min_fill_gap_s: extract_with_default(dict, "min_fill_gap_s", d.min_fill_gap_s)?,
        policy: match dict.get_item("policy")? {
            Some(py_policy) => parse_policy(&py_policy.downcast_into()?)?,
            None => d.policy,
        },
    })
}

/// Convert a Python dict to a parameter patch
///
/// Only the fields present in the dict are patched.
pub fn parse_patch(dict: &Bound<'_, PyDict>) -> PyResult<SimParamsPatch> {
    Ok(SimParamsPatch {
        arrival_rate_per_s: extract_optional(dict, "arrival_rate_per_s")?,
        max_live_sessions: extract_optional(dict, "max_live_sessions")?,
        mean_session_lifetime_s: extract_optional(dict, "mean_session_lifetime_s")?,
        opportunity_rate_per_s: extract_optional(dict, "opportunity_rate_per_s")?,
        tolerance_mean: extract_optional(dict, "tolerance_mean")?,
        tolerance_sd: extract_optional(dict, "tolerance_sd")?,
        decay_per_s: extract_optional(dict, "decay_per_s")?,
        fill_increment: extract_optional(dict, "fill_increment")?,
        hazard_gain: extract_optional(dict, "hazard_gain")?,
        base_ctr: extract_optional(dict, "base_ctr")?,
        ctr_penalty: extract_optional(dict, "ctr_penalty")?,
        quality_penalty: extract_optional(dict, "quality_penalty")?,
        bidder_count: extract_optional(dict, "bidder_count")?,
        bid_mean: extract_optional(dict, "bid_mean")?,
        bid_sigma: extract_optional(dict, "bid_sigma")?,
        floor_price: extract_optional(dict, "floor_price")?,
        take_rate: extract_optional(dict, "take_rate")?,
        max_fills_per_session: extract_optional(dict, "max_fills_per_session")?,
        min_fill_gap_s: extract_optional(dict, "min_fill_gap_s")?,
        policy: match dict.get_item("policy")? {
            Some(py_policy) => Some(parse_policy(&py_policy.downcast_into()?)?),
            None => None,
        },
    })
}

/// Convert a Python policy dict to PolicyKind
///
/// Expects `{"type": "fixed", "show_rate": ...}` or
/// `{"type": "adaptive", "base_show_rate": ..., "steepness": ...}`.
pub fn parse_policy(dict: &Bound<'_, PyDict>) -> PyResult<PolicyKind> {
    let kind: String = dict
        .get_item("type")?
        .ok_or_else(|| value_error("Missing required field 'type' in policy".to_string()))?
        .extract()?;

    match kind.as_str() {
        "fixed" => Ok(PolicyKind::Fixed {
            show_rate: extract_with_default(dict, "show_rate", 0.9)?,
        }),
        "adaptive" => {
            let default = PolicyKind::default();
            let PolicyKind::Adaptive {
                base_show_rate,
                steepness,
            } = default
            else {
                unreachable!("default policy is adaptive");
            };
            Ok(PolicyKind::Adaptive {
                base_show_rate: extract_with_default(dict, "base_show_rate", base_show_rate)?,
                steepness: extract_with_default(dict, "steepness", steepness)?,
            })
        }
        other => Err(value_error(format!(
            "Unknown policy type '{}' (expected 'fixed' or 'adaptive')",
            other
        ))),
    }
}

// ========================================================================
// Rust -> Python Converters
// ========================================================================

/// Convert active parameters to a Python dict
pub fn params_to_py(py: Python, params: &SimParams) -> PyResult<Py<PyDict>> {
    let dict = PyDict::new(py);
    dict.set_item("arrival_rate_per_s", params.arrival_rate_per_s)?;
    dict.set_item("max_live_sessions", params.max_live_sessions)?;
    dict.set_item("mean_session_lifetime_s", params.mean_session_lifetime_s)?;
    dict.set_item("opportunity_rate_per_s", params.opportunity_rate_per_s)?;
    dict.set_item("tolerance_mean", params.tolerance_mean)?;
    dict.set_item("tolerance_sd", params.tolerance_sd)?;
    dict.set_item("decay_per_s", params.decay_per_s)?;
    dict.set_item("fill_increment", params.fill_increment)?;
    dict.set_item("hazard_gain", params.hazard_gain)?;
    dict.set_item("base_ctr", params.base_ctr)?;
    dict.set_item("ctr_penalty", params.ctr_penalty)?;
    dict.set_item("quality_penalty", params.quality_penalty)?;
    dict.set_item("bidder_count", params.bidder_count)?;
    dict.set_item("bid_mean", params.bid_mean)?;
    dict.set_item("bid_sigma", params.bid_sigma)?;
    dict.set_item("floor_price", params.floor_price)?;
    dict.set_item("take_rate", params.take_rate)?;
    dict.set_item("max_fills_per_session", params.max_fills_per_session)?;
    dict.set_item("min_fill_gap_s", params.min_fill_gap_s)?;
    dict.set_item("policy", policy_to_py(py, &params.policy)?)?;
    Ok(dict.into())
}

/// Convert PolicyKind to a Python dict
pub fn policy_to_py(py: Python, policy: &PolicyKind) -> PyResult<Py<PyDict>> {
    let dict = PyDict::new(py);
    match policy {
        PolicyKind::Fixed { show_rate } => {
            dict.set_item("type", "fixed")?;
            dict.set_item("show_rate", show_rate)?;
        }
        PolicyKind::Adaptive {
            base_show_rate,
            steepness,
        } => {
            dict.set_item("type", "adaptive")?;
            dict.set_item("base_show_rate", base_show_rate)?;
            dict.set_item("steepness", steepness)?;
        }
    }
    Ok(dict.into())
}

/// Convert TickReport to a Python dict
pub fn tick_report_to_py(py: Python, report: &TickReport) -> PyResult<Py<PyDict>> {
    let dict = PyDict::new(py);
    dict.set_item("time_s", report.time_s)?;
    dict.set_item("arrivals", report.arrivals)?;
    dict.set_item("turned_away", report.turned_away)?;
    dict.set_item("opportunities", report.opportunities)?;
    dict.set_item("fills", report.fills)?;
    dict.set_item("exits", report.exits)?;
    dict.set_item("seconds_flushed", report.seconds_flushed)?;
    Ok(dict.into())
}

fn no_fill_to_py(py: Python, breakdown: &NoFillBreakdown) -> PyResult<Py<PyDict>> {
    let dict = PyDict::new(py);
    dict.set_item("policy", breakdown.policy)?;
    dict.set_item("floor", breakdown.floor)?;
    dict.set_item("fill_cap", breakdown.fill_cap)?;
    dict.set_item("min_gap", breakdown.min_gap)?;
    dict.set_item("total", breakdown.total())?;
    Ok(dict.into())
}

/// Convert a per-second snapshot to a Python dict
pub fn snapshot_to_py(py: Python, snapshot: &SecondSnapshot) -> PyResult<Py<PyDict>> {
    let dict = PyDict::new(py);
    dict.set_item("seq", snapshot.seq)?;
    dict.set_item("time_s", snapshot.time_s)?;
    dict.set_item("live_sessions", snapshot.live_sessions)?;
    dict.set_item("arrivals", snapshot.arrivals)?;
    dict.set_item("turned_away", snapshot.turned_away)?;
    dict.set_item("cap_hit", snapshot.cap_hit)?;
    dict.set_item("opportunities", snapshot.opportunities)?;
    dict.set_item("fills", snapshot.fills)?;
    dict.set_item("clicks", snapshot.clicks)?;
    dict.set_item("no_fill", no_fill_to_py(py, &snapshot.no_fill)?)?;
    dict.set_item("exits_natural", snapshot.exits_natural)?;
    dict.set_item("exits_early", snapshot.exits_early)?;
    dict.set_item("spend", snapshot.spend)?;
    dict.set_item("take", snapshot.take)?;
    dict.set_item("mean_fatigue", snapshot.mean_fatigue)?;
    dict.set_item("fill_rate", snapshot.fill_rate)?;
    dict.set_item("fill_rate_60", snapshot.fill_rate_60)?;
    dict.set_item("avg_price_60", snapshot.avg_price_60)?;
    dict.set_item("spend_per_s_60", snapshot.spend_per_s_60)?;
    dict.set_item("take_per_s_60", snapshot.take_per_s_60)?;
    dict.set_item("ctr_60", snapshot.ctr_60)?;
    dict.set_item("arrivals_per_s_60", snapshot.arrivals_per_s_60)?;
    dict.set_item("no_fill_60", no_fill_to_py(py, &snapshot.no_fill_60)?)?;
    dict.set_item("p50_price", snapshot.p50_price)?;
    dict.set_item("p90_price", snapshot.p90_price)?;
    dict.set_item("diag_clamp_fallbacks", snapshot.diag_clamp_fallbacks)?;
    Ok(dict.into())
}

/// Convert the rolling history to a dict of parallel lists
pub fn series_to_py(py: Python, series: &SeriesSnapshot) -> PyResult<Py<PyDict>> {
    let dict = PyDict::new(py);
    dict.set_item("time", series.time.clone())?;
    dict.set_item("live", series.live.clone())?;
    dict.set_item("arrivals", series.arrivals.clone())?;
    dict.set_item("turned_away", series.turned_away.clone())?;
    dict.set_item("opportunities", series.opportunities.clone())?;
    dict.set_item("fills", series.fills.clone())?;
    dict.set_item("clicks", series.clicks.clone())?;
    dict.set_item("no_fill_policy", series.no_fill_policy.clone())?;
    dict.set_item("no_fill_floor", series.no_fill_floor.clone())?;
    dict.set_item("no_fill_cap", series.no_fill_cap.clone())?;
    dict.set_item("no_fill_min_gap", series.no_fill_min_gap.clone())?;
    dict.set_item("spend", series.spend.clone())?;
    dict.set_item("take", series.take.clone())?;
    dict.set_item("mean_fatigue", series.mean_fatigue.clone())?;
    dict.set_item("exits_natural", series.exits_natural.clone())?;
    dict.set_item("exits_early", series.exits_early.clone())?;
    Ok(dict.into())
}

/// Convert a session view to a Python dict
pub fn session_view_to_py(py: Python, view: &SessionView) -> PyResult<Py<PyDict>> {
    let dict = PyDict::new(py);
    dict.set_item("id", view.id)?;
    dict.set_item("age_s", view.age_s)?;
    dict.set_item("target_lifetime_s", view.target_lifetime_s)?;
    dict.set_item("tolerance", view.tolerance)?;
    dict.set_item("fatigue", view.fatigue)?;
    dict.set_item("fills", view.fills)?;
    dict.set_item("clicks", view.clicks)?;
    Ok(dict.into())
}

/// Convert an event to a Python dict with a `type` discriminant
pub fn event_to_py(py: Python, event: &Event) -> PyResult<Py<PyDict>> {
    let dict = PyDict::new(py);
    dict.set_item("type", event.event_type())?;
    dict.set_item("time_s", event.time_s())?;
    if let Some(session_id) = event.session_id() {
        dict.set_item("session_id", session_id)?;
    }
    match event {
        Event::SessionEnded { kind, fills, .. } => {
            dict.set_item("kind", format!("{:?}", kind).to_lowercase())?;
            dict.set_item("fills", fills)?;
        }
        Event::Filled {
            winner_id,
            price,
            clicked,
            ..
        } => {
            dict.set_item("winner_id", winner_id)?;
            dict.set_item("price", price)?;
            dict.set_item("clicked", clicked)?;
        }
        Event::NoFill { reason, .. } => {
            dict.set_item("reason", format!("{:?}", reason))?;
        }
        Event::CapReached { turned_away, .. } => {
            dict.set_item("turned_away", turned_away)?;
        }
        Event::Reset { seed, .. } => {
            dict.set_item("seed", seed)?;
        }
        Event::SessionArrived { .. } | Event::ParamsChanged { .. } => {}
    }
    Ok(dict.into())
}

/// Convert a slice of snapshots to a Python list of dicts
pub fn snapshots_to_py(py: Python, snapshots: &[SecondSnapshot]) -> PyResult<Py<PyList>> {
    let list = PyList::empty(py);
    for snapshot in snapshots {
        list.append(snapshot_to_py(py, snapshot)?)?;
    }
    Ok(list.into())
}
