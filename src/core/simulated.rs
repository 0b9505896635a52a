//! In-memory backup server used by integration tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::api::models::{
    Backup, BackupDefinition, BackupMetadata, ProgressState, SystemInfo,
};
use crate::core::endpoint::BackupEndpoint;
use crate::core::error::Error;

#[derive(Default)]
struct SimState {
    backups: Vec<BackupDefinition>,
    backup_errors: HashMap<String, Error>,
    listing_error: Option<Error>,
    progress: Option<ProgressState>,
    progress_error: Option<Error>,
    run_error: Option<Error>,
    run_calls: Vec<String>,
}

/// Scripted stand-in for a Duplicati server.
pub struct SimulatedServer {
    state: Arc<Mutex<SimState>>,
}

/// Controller handle used by tests to script server behavior.
#[derive(Clone)]
pub struct Simulator {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedServer {
    pub fn new() -> (Self, Simulator) {
        let state = Arc::new(Mutex::new(SimState::default()));
        (
            Self {
                state: Arc::clone(&state),
            },
            Simulator { state },
        )
    }
}

impl Simulator {
    /// Add or replace a backup definition on the simulated server.
    pub fn set_backup(&self, definition: BackupDefinition) {
        let mut state = self.state.lock().unwrap();
        state
            .backups
            .retain(|d| d.backup.id != definition.backup.id);
        state.backups.push(definition);
    }

    /// Convenience constructor for a backup with the given metadata.
    pub fn backup(id: &str, name: &str, metadata: BackupMetadata) -> BackupDefinition {
        BackupDefinition {
            backup: Backup {
                id: id.to_string(),
                name: name.to_string(),
                description: None,
                metadata,
            },
            schedule: None,
        }
    }

    pub fn remove_backup(&self, backup_id: &str) {
        let mut state = self.state.lock().unwrap();
        state.backups.retain(|d| d.backup.id != backup_id);
    }

    /// Make `get_backup` for one id fail until cleared.
    pub fn fail_backup(&self, backup_id: &str, error: Error) {
        self.state
            .lock()
            .unwrap()
            .backup_errors
            .insert(backup_id.to_string(), error);
    }

    pub fn clear_backup_failure(&self, backup_id: &str) {
        self.state.lock().unwrap().backup_errors.remove(backup_id);
    }

    pub fn fail_listing(&self, error: Option<Error>) {
        self.state.lock().unwrap().listing_error = error;
    }

    pub fn fail_progress(&self, error: Option<Error>) {
        self.state.lock().unwrap().progress_error = error;
    }

    pub fn fail_run(&self, error: Option<Error>) {
        self.state.lock().unwrap().run_error = error;
    }

    /// Report a backup as actively running.
    pub fn set_running(&self, backup_id: &str) {
        self.state.lock().unwrap().progress = Some(ProgressState {
            backup_id: backup_id.to_string(),
            phase: "Backup_ProcessingFiles".to_string(),
            overall_progress: 0.5,
            ..Default::default()
        });
    }

    /// Report the last run as finished; the server keeps a terminal phase
    /// around until the next run starts.
    pub fn set_complete(&self, backup_id: &str) {
        self.state.lock().unwrap().progress = Some(ProgressState {
            backup_id: backup_id.to_string(),
            phase: "Backup_Complete".to_string(),
            overall_progress: 1.0,
            ..Default::default()
        });
    }

    pub fn clear_progress(&self) {
        self.state.lock().unwrap().progress = None;
    }

    /// Backup ids for which a run was requested, in order.
    pub fn run_calls(&self) -> Vec<String> {
        self.state.lock().unwrap().run_calls.clone()
    }
}

#[async_trait]
impl BackupEndpoint for SimulatedServer {
    async fn list_backups(&self) -> Result<Vec<BackupDefinition>, Error> {
        let state = self.state.lock().unwrap();
        if let Some(err) = &state.listing_error {
            return Err(err.clone());
        }
        Ok(state.backups.clone())
    }

    async fn get_backup(&self, backup_id: &str) -> Result<BackupDefinition, Error> {
        let state = self.state.lock().unwrap();
        if let Some(err) = state.backup_errors.get(backup_id) {
            return Err(err.clone());
        }
        state
            .backups
            .iter()
            .find(|d| d.backup.id == backup_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(backup_id.to_string()))
    }

    async fn progress_state(&self) -> Result<Option<ProgressState>, Error> {
        let state = self.state.lock().unwrap();
        if let Some(err) = &state.progress_error {
            return Err(err.clone());
        }
        Ok(state.progress.clone())
    }

    async fn run_backup(&self, backup_id: &str) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        state.run_calls.push(backup_id.to_string());
        if let Some(err) = &state.run_error {
            return Err(err.clone());
        }
        Ok(())
    }

    async fn system_info(&self) -> Result<SystemInfo, Error> {
        Ok(SystemInfo {
            server_version: Some("2.1.0.5".to_string()),
            server_version_name: Some("Simulated".to_string()),
            api_version: Some(1),
        })
    }
}
