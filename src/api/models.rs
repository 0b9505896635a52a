//! Wire types for the Duplicati REST API.
//!
//! Field names follow the server's PascalCase JSON. Unknown fields are
//! ignored so additive schema changes on the server side do not break the
//! client; a missing required field fails deserialization and is reported
//! as a protocol error.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use std::time::Duration;

/// One entry of `GET /api/v1/Backups`, also the body of
/// `GET /api/v1/Backup/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct BackupDefinition {
    #[serde(rename = "Backup")]
    pub backup: Backup,
    #[serde(rename = "Schedule", default)]
    pub schedule: Option<Schedule>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Backup {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Description", default)]
    pub description: Option<String>,
    #[serde(rename = "Metadata", default)]
    pub metadata: BackupMetadata,
}

/// Run statistics the server attaches to a backup.
///
/// Everything is optional: a backup that has never run carries no metadata,
/// and the server serializes all values as strings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BackupMetadata {
    #[serde(rename = "LastBackupStarted", default)]
    pub last_backup_started: Option<String>,
    #[serde(rename = "LastBackupFinished", default)]
    pub last_backup_finished: Option<String>,
    #[serde(rename = "LastBackupDuration", default)]
    pub last_backup_duration: Option<String>,
    #[serde(rename = "LastErrorDate", default)]
    pub last_error_date: Option<String>,
    #[serde(rename = "LastErrorMessage", default)]
    pub last_error_message: Option<String>,
    #[serde(rename = "SourceFilesSize", default)]
    pub source_files_size: Option<String>,
    #[serde(rename = "SourceFilesCount", default)]
    pub source_files_count: Option<String>,
    #[serde(rename = "TargetFilesSize", default)]
    pub target_files_size: Option<String>,
    #[serde(rename = "TargetFilesCount", default)]
    pub target_files_count: Option<String>,
}

impl BackupMetadata {
    pub fn last_backup_started(&self) -> Option<DateTime<Utc>> {
        self.last_backup_started
            .as_deref()
            .and_then(parse_compact_timestamp)
    }

    pub fn last_backup_finished(&self) -> Option<DateTime<Utc>> {
        self.last_backup_finished
            .as_deref()
            .and_then(parse_compact_timestamp)
    }

    pub fn last_error_date(&self) -> Option<DateTime<Utc>> {
        self.last_error_date
            .as_deref()
            .and_then(parse_compact_timestamp)
    }

    pub fn last_error_message(&self) -> Option<String> {
        self.last_error_message
            .as_deref()
            .filter(|m| !m.is_empty())
            .map(String::from)
    }

    pub fn last_backup_duration(&self) -> Option<Duration> {
        self.last_backup_duration
            .as_deref()
            .and_then(parse_hms_duration)
    }

    pub fn source_files_size(&self) -> Option<u64> {
        self.source_files_size.as_deref().and_then(|v| v.parse().ok())
    }

    pub fn source_files_count(&self) -> Option<u64> {
        self.source_files_count.as_deref().and_then(|v| v.parse().ok())
    }

    pub fn target_files_size(&self) -> Option<u64> {
        self.target_files_size.as_deref().and_then(|v| v.parse().ok())
    }

    pub fn target_files_count(&self) -> Option<u64> {
        self.target_files_count.as_deref().and_then(|v| v.parse().ok())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Schedule {
    #[serde(rename = "ID", default)]
    pub id: i64,
    #[serde(rename = "Time", default)]
    pub time: Option<String>,
    #[serde(rename = "Repeat", default)]
    pub repeat: Option<String>,
}

impl Schedule {
    /// Next scheduled execution, if the server reported one.
    pub fn next_time(&self) -> Option<DateTime<Utc>> {
        self.time.as_deref().and_then(parse_schedule_timestamp)
    }
}

/// Body of `GET /api/v1/ProgressState`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProgressState {
    #[serde(rename = "BackupID")]
    pub backup_id: String,
    #[serde(rename = "TaskID")]
    pub task_id: i64,
    #[serde(rename = "Phase")]
    pub phase: String,
    #[serde(rename = "OverallProgress")]
    pub overall_progress: f64,
    #[serde(rename = "ProcessedFileCount")]
    pub processed_file_count: i64,
    #[serde(rename = "TotalFileCount")]
    pub total_file_count: i64,
    #[serde(rename = "StillCounting")]
    pub still_counting: bool,
}

impl ProgressState {
    /// Phases in which no backup is executing.
    pub fn is_terminal_phase(&self) -> bool {
        matches!(
            self.phase.as_str(),
            "Backup_Complete" | "Error" | "No active backup"
        )
    }

    /// Whether this progress report describes an active run of `backup_id`.
    pub fn is_running_for(&self, backup_id: &str) -> bool {
        self.backup_id == backup_id && !self.is_terminal_phase()
    }

    /// Whether any backup is currently executing on the server.
    pub fn is_any_running(&self) -> bool {
        !self.backup_id.is_empty() && !self.is_terminal_phase()
    }
}

/// Body of `POST /api/v1/auth/login`.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    #[serde(rename = "AccessToken")]
    pub access_token: String,
}

/// Body of `POST /api/v1/Backup/{id}/run`.
#[derive(Debug, Clone, Deserialize)]
pub struct RunBackupResponse {
    #[serde(rename = "Status", default)]
    pub status: Option<String>,
}

/// Body of `GET /api/v1/SystemInfo`, parsed leniently.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SystemInfo {
    #[serde(rename = "ServerVersion")]
    pub server_version: Option<String>,
    #[serde(rename = "ServerVersionName")]
    pub server_version_name: Option<String>,
    #[serde(rename = "APIVersion")]
    pub api_version: Option<i64>,
}

/// Metadata timestamps use the compact `20240601T103000Z` format.
fn parse_compact_timestamp(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%SZ")
        .ok()
        .map(|dt| dt.and_utc())
}

/// Schedule timestamps use `2024-06-01T10:30:00Z`.
fn parse_schedule_timestamp(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%SZ")
        .ok()
        .map(|dt| dt.and_utc())
}

/// Durations come as `HH:MM:SS` with an optional fractional part; hours can
/// exceed two digits.
fn parse_hms_duration(value: &str) -> Option<Duration> {
    let mut parts = value.split(':');
    let hours: u64 = parts.next()?.parse().ok()?;
    let minutes: u64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || seconds < 0.0 {
        return None;
    }
    Some(Duration::from_secs_f64(
        (hours * 3600 + minutes * 60) as f64 + seconds,
    ))
}
