//! Event logging for simulation inspection and debugging.
//!
//! This module defines the Event enum which captures significant state
//! changes during simulation. Events enable:
//! - Debugging (understand what happened and when)
//! - Testing (assert on lifecycle transitions directly)
//! - Analysis (trace a single session through its whole life)
//!
//! The log is bounded: the engine runs indefinitely, so old events are
//! discarded oldest-first once the capacity is reached.
//!
//! # Event Types
//!
//! Events are categorized by simulation phase:
//! - **SessionArrived / SessionEnded**: lifecycle transitions
//! - **Filled / NoFill**: per-opportunity auction outcomes
//! - **CapReached**: arrivals turned away at the live-session cap
//! - **ParamsChanged / Reset**: control-plane actions

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::outcome::{ExitKind, NoFillReason};

/// Simulation event capturing a state change.
///
/// All events carry the simulation time at which they occurred.
/// Events are logged in the order they occur within a tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// New session entered the simulation
    SessionArrived { time_s: f64, session_id: u64 },

    /// Session left the simulation
    SessionEnded {
        time_s: f64,
        session_id: u64,
        kind: ExitKind,
        fills: u32,
    },

    /// An opportunity cleared and the ad was delivered
    Filled {
        time_s: f64,
        session_id: u64,
        winner_id: u32,
        price: f64,
        clicked: bool,
    },

    /// An opportunity was rejected
    NoFill {
        time_s: f64,
        session_id: u64,
        reason: NoFillReason,
    },

    /// Arrivals were turned away because the live-session cap was hit
    CapReached { time_s: f64, turned_away: u32 },

    /// Parameters were patched between ticks
    ParamsChanged { time_s: f64 },

    /// Simulation was reset to a fresh run
    Reset { time_s: f64, seed: u32 },
}

impl Event {
    /// Simulation time at which this event occurred
    pub fn time_s(&self) -> f64 {
        match self {
            Event::SessionArrived { time_s, .. } => *time_s,
            Event::SessionEnded { time_s, .. } => *time_s,
            Event::Filled { time_s, .. } => *time_s,
            Event::NoFill { time_s, .. } => *time_s,
            Event::CapReached { time_s, .. } => *time_s,
            Event::ParamsChanged { time_s } => *time_s,
            Event::Reset { time_s, .. } => *time_s,
        }
    }

    /// Get a short description of the event type
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::SessionArrived { .. } => "SessionArrived",
            Event::SessionEnded { .. } => "SessionEnded",
            Event::Filled { .. } => "Filled",
            Event::NoFill { .. } => "NoFill",
            Event::CapReached { .. } => "CapReached",
            Event::ParamsChanged { .. } => "ParamsChanged",
            Event::Reset { .. } => "Reset",
        }
    }

    /// Get session ID if the event relates to a specific session
    pub fn session_id(&self) -> Option<u64> {
        match self {
            Event::SessionArrived { session_id, .. } => Some(*session_id),
            Event::SessionEnded { session_id, .. } => Some(*session_id),
            Event::Filled { session_id, .. } => Some(*session_id),
            Event::NoFill { session_id, .. } => Some(*session_id),
            _ => None,
        }
    }
}

/// Bounded event log, discarding oldest events once full.
#[derive(Debug, Clone)]
pub struct EventLog {
    events: VecDeque<Event>,
    capacity: usize,
    total_recorded: u64,
}

impl EventLog {
    /// Create a log retaining at most `capacity` recent events
    pub fn new(capacity: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            total_recorded: 0,
        }
    }

    /// Add an event to the log, evicting the oldest if at capacity
    pub fn record(&mut self, event: Event) {
        self.total_recorded += 1;
        if self.capacity == 0 {
            return;
        }
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    /// Number of events currently retained
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if the log is empty
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Total events ever recorded, including evicted ones
    pub fn total_recorded(&self) -> u64 {
        self.total_recorded
    }

    /// Iterate over retained events, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    /// Get retained events of a specific type
    pub fn events_of_type(&self, event_type: &str) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| e.event_type() == event_type)
            .collect()
    }

    /// Get retained events for a specific session
    pub fn events_for_session(&self, session_id: u64) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| e.session_id() == Some(session_id))
            .collect()
    }

    /// Clear all events
    pub fn clear(&mut self) {
        self.events.clear();
        self.total_recorded = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_time_and_type() {
        let event = Event::Filled {
            time_s: 4.2,
            session_id: 17,
            winner_id: 2,
            price: 1.9,
            clicked: false,
        };
        assert_eq!(event.time_s(), 4.2);
        assert_eq!(event.event_type(), "Filled");
        assert_eq!(event.session_id(), Some(17));
    }

    #[test]
    fn test_control_events_have_no_session() {
        let event = Event::Reset {
            time_s: 0.0,
            seed: 99,
        };
        assert_eq!(event.session_id(), None);
    }

    #[test]
    fn test_log_records_and_queries() {
        let mut log = EventLog::new(16);
        log.record(Event::SessionArrived {
            time_s: 0.1,
            session_id: 1,
        });
        log.record(Event::NoFill {
            time_s: 0.2,
            session_id: 1,
            reason: NoFillReason::Policy,
        });
        log.record(Event::SessionArrived {
            time_s: 0.3,
            session_id: 2,
        });

        assert_eq!(log.len(), 3);
        assert_eq!(log.events_of_type("SessionArrived").len(), 2);
        assert_eq!(log.events_for_session(1).len(), 2);
    }

    #[test]
    fn test_log_evicts_oldest_at_capacity() {
        let mut log = EventLog::new(2);
        for id in 1..=5 {
            log.record(Event::SessionArrived {
                time_s: id as f64,
                session_id: id,
            });
        }
        assert_eq!(log.len(), 2);
        assert_eq!(log.total_recorded(), 5);
        let ids: Vec<u64> = log.iter().filter_map(|e| e.session_id()).collect();
        assert_eq!(ids, vec![4, 5]);
    }

    #[test]
    fn test_zero_capacity_log_retains_nothing() {
        let mut log = EventLog::new(0);
        log.record(Event::ParamsChanged { time_s: 1.0 });
        assert!(log.is_empty());
        assert_eq!(log.total_recorded(), 1);
    }

    #[test]
    fn test_event_json_tag_format() {
        let event = Event::NoFill {
            time_s: 1.5,
            session_id: 3,
            reason: NoFillReason::Floor,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"no_fill""#));
        assert!(json.contains(r#""reason":"floor""#));
    }
}
