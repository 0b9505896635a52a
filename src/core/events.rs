//! Derivation of discrete backup events from polled state.
//!
//! The monitor only ever sees snapshots, so events are computed by
//! comparing the state recorded by the previous poll with the current one.
//! This is a pure function of the two states, which keeps it testable
//! without any network layer.

use std::time::Duration;

use super::models::{JobSnapshot, JobState};

/// Events emitted when a monitored backup changes state between polls.
#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
    Started {
        backup_id: String,
        name: String,
    },
    Completed {
        backup_id: String,
        name: String,
        /// True when the run finished but logged problems.
        warnings: bool,
        duration: Option<Duration>,
        target_size: Option<u64>,
    },
    Failed {
        backup_id: String,
        name: String,
        error: String,
    },
}

impl JobEvent {
    pub fn backup_id(&self) -> &str {
        match self {
            JobEvent::Started { backup_id, .. }
            | JobEvent::Completed { backup_id, .. }
            | JobEvent::Failed { backup_id, .. } => backup_id,
        }
    }
}

/// Compute the events implied by a single observed transition.
///
/// A run that starts and finishes entirely between two polls produces no
/// events: no transition was observed, none is invented.
pub fn transition_events(
    backup_id: &str,
    previous: JobState,
    current: &JobSnapshot,
) -> Vec<JobEvent> {
    let mut events = Vec::new();

    match current.state {
        JobState::Running if previous != JobState::Running => {
            events.push(JobEvent::Started {
                backup_id: backup_id.to_string(),
                name: current.name.clone(),
            });
        }
        JobState::Succeeded | JobState::Warning if previous == JobState::Running => {
            events.push(JobEvent::Completed {
                backup_id: backup_id.to_string(),
                name: current.name.clone(),
                warnings: current.state == JobState::Warning,
                duration: current.last_duration,
                target_size: current.target_size,
            });
        }
        JobState::Failed if previous == JobState::Running => {
            events.push(JobEvent::Failed {
                backup_id: backup_id.to_string(),
                name: current.name.clone(),
                error: current
                    .error_message
                    .clone()
                    .unwrap_or_else(|| "unknown error".to_string()),
            });
        }
        _ => {}
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(state: JobState) -> JobSnapshot {
        JobSnapshot {
            state,
            name: "Documents".into(),
            last_run: None,
            last_started: None,
            last_duration: Some(Duration::from_secs(90)),
            source_size: None,
            source_files: None,
            target_size: Some(1024),
            target_files: None,
            next_run: None,
            error_message: Some("disk full".into()),
        }
    }

    #[test]
    fn idle_to_running_emits_started() {
        let events = transition_events("4", JobState::Idle, &snapshot(JobState::Running));
        assert_eq!(
            events,
            vec![JobEvent::Started {
                backup_id: "4".into(),
                name: "Documents".into(),
            }]
        );
    }

    #[test]
    fn running_to_running_emits_nothing() {
        assert!(transition_events("4", JobState::Running, &snapshot(JobState::Running)).is_empty());
    }

    #[test]
    fn running_to_succeeded_emits_completed() {
        let events = transition_events("4", JobState::Running, &snapshot(JobState::Succeeded));
        assert_eq!(events.len(), 1);
        match &events[0] {
            JobEvent::Completed {
                warnings,
                duration,
                target_size,
                ..
            } => {
                assert!(!warnings);
                assert_eq!(*duration, Some(Duration::from_secs(90)));
                assert_eq!(*target_size, Some(1024));
            }
            other => panic!("expected Completed, got {other:?}"),
        }
    }

    #[test]
    fn running_to_warning_emits_completed_with_warnings() {
        let events = transition_events("4", JobState::Running, &snapshot(JobState::Warning));
        assert!(matches!(
            events.as_slice(),
            [JobEvent::Completed { warnings: true, .. }]
        ));
    }

    #[test]
    fn running_to_failed_emits_failed_with_message() {
        let events = transition_events("4", JobState::Running, &snapshot(JobState::Failed));
        assert_eq!(
            events,
            vec![JobEvent::Failed {
                backup_id: "4".into(),
                name: "Documents".into(),
                error: "disk full".into(),
            }]
        );
    }

    #[test]
    fn stable_states_emit_nothing() {
        for state in [JobState::Unknown, JobState::Idle, JobState::Succeeded] {
            assert!(transition_events("4", state, &snapshot(JobState::Idle)).is_empty());
        }
    }

    #[test]
    fn first_poll_showing_old_success_emits_nothing() {
        assert!(
            transition_events("4", JobState::Unknown, &snapshot(JobState::Idle)).is_empty()
        );
    }
}
