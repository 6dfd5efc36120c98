//! Event types for supervisor -> observer streaming

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use curfew_util::RunId;

use crate::{API_VERSION, ShutdownReason, ShutdownReport, SupervisorState};

/// Event envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub api_version: u32,
    pub timestamp: DateTime<Local>,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(timestamp: DateTime<Local>, payload: EventPayload) -> Self {
        Self {
            api_version: API_VERSION,
            timestamp,
            payload,
        }
    }
}

/// Everything the supervisor reports to its subscriber
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// Supervisor state transition
    StateChanged {
        from: SupervisorState,
        to: SupervisorState,
    },

    /// Result of an Offline poll-cycle window check
    WindowChecked { allowed: bool },

    /// Workload construction or `initialize()` failed; back to Offline
    StartFailed { run_id: RunId, error: String },

    /// An Online period has been fully swept
    PeriodEnded {
        run_id: RunId,
        reason: ShutdownReason,
        report: ShutdownReport,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serialization() {
        let event = Event::new(
            curfew_util::now(),
            EventPayload::PeriodEnded {
                run_id: RunId::new(),
                reason: ShutdownReason::WindowClosed,
                report: ShutdownReport {
                    completed: 2,
                    ..Default::default()
                },
            },
        );

        let json = serde_json::to_string(&event).unwrap();
        let parsed: Event = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.api_version, API_VERSION);
        assert!(matches!(
            parsed.payload,
            EventPayload::PeriodEnded {
                reason: ShutdownReason::WindowClosed,
                ..
            }
        ));
    }

    #[test]
    fn state_changed_wire_shape() {
        let payload = EventPayload::StateChanged {
            from: SupervisorState::Offline,
            to: SupervisorState::Starting,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["type"], "state_changed");
        assert_eq!(json["from"], "offline");
        assert_eq!(json["to"], "starting");
    }
}
