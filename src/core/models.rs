use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

use crate::api::models::BackupDefinition;

/// A backup job as advertised by the server's listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupJob {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
}

/// Observed execution state of a monitored backup.
///
/// Transitions only happen when a poll observes them:
/// `Unknown -> Idle -> Running -> (Succeeded | Warning | Failed) -> Idle`.
/// A terminal result is entered only from `Running`, on the poll that first
/// sees the run finished; the poll after that decays back to `Idle`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum JobState {
    #[default]
    Unknown,
    Idle,
    Running,
    Succeeded,
    Warning,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Unknown => "unknown",
            JobState::Idle => "idle",
            JobState::Running => "running",
            JobState::Succeeded => "succeeded",
            JobState::Warning => "warning",
            JobState::Failed => "failed",
        }
    }
}

/// Result of the most recent finished run, derived from server metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunOutcome {
    Succeeded,
    Warning,
    Failed,
}

/// Point-in-time view of one monitored backup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSnapshot {
    pub state: JobState,
    pub name: String,
    /// End of the last run; for a failed run this is the error timestamp.
    pub last_run: Option<DateTime<Utc>>,
    pub last_started: Option<DateTime<Utc>>,
    pub last_duration: Option<Duration>,
    pub source_size: Option<u64>,
    pub source_files: Option<u64>,
    pub target_size: Option<u64>,
    pub target_files: Option<u64>,
    pub next_run: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl JobSnapshot {
    /// Build a snapshot from a polled backup definition.
    ///
    /// `running` comes from the server's progress state for this backup id.
    /// `previous` is the state recorded by the last poll; a terminal result
    /// is only entered from `Running` so it is reported exactly once.
    pub fn observe(
        definition: &BackupDefinition,
        running: bool,
        previous: JobState,
        now: DateTime<Utc>,
    ) -> Self {
        let meta = &definition.backup.metadata;
        let finished = meta.last_backup_finished();
        let started = meta.last_backup_started();
        let error_at = meta.last_error_date();

        let outcome = match (error_at, finished) {
            (Some(err_at), Some(done)) if err_at > done => Some(RunOutcome::Failed),
            (Some(_), None) => Some(RunOutcome::Failed),
            // An error recorded inside the run window means the run finished
            // but logged problems along the way.
            (Some(err_at), Some(done))
                if started.is_some_and(|s| err_at >= s) && err_at <= done =>
            {
                Some(RunOutcome::Warning)
            }
            (_, Some(_)) => Some(RunOutcome::Succeeded),
            (None, None) => None,
        };

        let state = if running {
            JobState::Running
        } else {
            match outcome {
                Some(o) if previous == JobState::Running => match o {
                    RunOutcome::Succeeded => JobState::Succeeded,
                    RunOutcome::Warning => JobState::Warning,
                    RunOutcome::Failed => JobState::Failed,
                },
                _ => JobState::Idle,
            }
        };

        let failed = matches!(outcome, Some(RunOutcome::Failed));
        let next_run = definition
            .schedule
            .as_ref()
            .and_then(|s| s.next_time())
            .filter(|t| *t > now);

        let error_message = match outcome {
            Some(RunOutcome::Failed) | Some(RunOutcome::Warning) => meta
                .last_error_message()
                .map(|m| truncate_error_message(&m, 255)),
            _ => None,
        };

        // The server does not clear run metrics on a failed run, so suppress
        // them ourselves rather than reporting numbers from an older run.
        JobSnapshot {
            state,
            name: definition.backup.name.clone(),
            last_run: if failed { error_at } else { finished },
            last_started: if failed { None } else { started },
            last_duration: if failed { None } else { meta.last_backup_duration() },
            source_size: if failed { None } else { meta.source_files_size() },
            source_files: if failed { None } else { meta.source_files_count() },
            target_size: if failed { None } else { meta.target_files_size() },
            target_files: if failed { None } else { meta.target_files_count() },
            next_run,
            error_message,
        }
    }
}

/// Truncate an error message on word boundaries so it stays displayable.
/// Words that do not fit are skipped, not cut mid-word.
pub fn truncate_error_message(message: &str, max_length: usize) -> String {
    const INDICATOR: &str = " ... (see log for full message)";
    let available = max_length.saturating_sub(INDICATOR.len());

    if message.len() <= available {
        return message.to_string();
    }

    let mut truncated = String::new();
    for word in message.split_whitespace() {
        if truncated.len() + word.len() > available {
            continue;
        }
        truncated.push_str(word);
        truncated.push(' ');
    }

    format!("{}{}", truncated.trim_end(), INDICATOR)
}
