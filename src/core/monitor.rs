//! The backup monitor: an eventually-consistent mirror of selected
//! backups on one Duplicati server.
//!
//! The monitor owns no timers. The daemon (or any other host) calls
//! [`BackupMonitor::refresh`] on whatever cadence it wants; the monitor
//! performs the network calls, reconciles the results into snapshots and
//! reports the state transitions it observed.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use chrono::Utc;
use futures_util::future::join_all;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::api::client::validate_backup_id;
use crate::core::endpoint::BackupEndpoint;
use crate::core::error::Error;
use crate::core::events::{JobEvent, transition_events};
use crate::core::models::{BackupJob, JobSnapshot, JobState};

/// Aggregate outcome of one poll.
///
/// Every monitored backup appears in `results`, each independently a
/// snapshot or an error; a failure on one backup never hides the others.
#[derive(Debug)]
pub struct RefreshReport {
    pub results: BTreeMap<String, Result<JobSnapshot, Error>>,
    /// State transitions observed by this poll, in result order.
    pub events: Vec<JobEvent>,
}

#[derive(Default)]
struct MonitorState {
    monitored: BTreeSet<String>,
    listing: Vec<BackupJob>,
    have_listing: bool,
    snapshots: HashMap<String, JobSnapshot>,
}

pub struct BackupMonitor {
    endpoint: Arc<dyn BackupEndpoint>,
    state: RwLock<MonitorState>,
    // Serializes refresh/trigger/membership mutations (single writer).
    // Read accessors only take the RwLock and stay concurrent.
    write_gate: Mutex<()>,
}

impl BackupMonitor {
    pub fn new<I, S>(endpoint: Arc<dyn BackupEndpoint>, monitored: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let monitored: BTreeSet<String> = monitored.into_iter().map(Into::into).collect();
        Self {
            endpoint,
            state: RwLock::new(MonitorState {
                monitored,
                ..Default::default()
            }),
            write_gate: Mutex::new(()),
        }
    }

    /// Fetch the server's backup listing and remember it as the last known
    /// listing. Returned in server order.
    pub async fn list_available_backups(&self) -> Result<Vec<BackupJob>, Error> {
        let _gate = self.write_gate.lock().await;
        self.fetch_listing().await
    }

    async fn fetch_listing(&self) -> Result<Vec<BackupJob>, Error> {
        let definitions = self.endpoint.list_backups().await?;
        let jobs: Vec<BackupJob> = definitions
            .iter()
            .map(|d| BackupJob {
                id: d.backup.id.clone(),
                name: d.backup.name.clone(),
                description: d.backup.description.clone().filter(|d| !d.is_empty()),
            })
            .collect();

        let mut state = self.state.write().await;
        state.listing = jobs.clone();
        state.have_listing = true;
        Ok(jobs)
    }

    /// Add a backup to the monitored set. Idempotent. When a listing is
    /// known, the id must appear in it.
    pub async fn monitor(&self, backup_id: &str) -> Result<(), Error> {
        let _gate = self.write_gate.lock().await;
        let mut state = self.state.write().await;
        if state.have_listing && !state.listing.iter().any(|j| j.id == backup_id) {
            return Err(Error::NotFound(backup_id.to_string()));
        }
        state.monitored.insert(backup_id.to_string());
        Ok(())
    }

    /// Remove a backup from the monitored set. Idempotent; the backup on
    /// the server is untouched.
    pub async fn deregister(&self, backup_id: &str) {
        let _gate = self.write_gate.lock().await;
        let mut state = self.state.write().await;
        state.monitored.remove(backup_id);
        state.snapshots.remove(backup_id);
    }

    pub async fn monitored(&self) -> Vec<String> {
        self.state.read().await.monitored.iter().cloned().collect()
    }

    /// Last reconciled snapshot of one backup, if any poll has seen it.
    pub async fn snapshot(&self, backup_id: &str) -> Option<JobSnapshot> {
        self.state.read().await.snapshots.get(backup_id).cloned()
    }

    pub async fn snapshots(&self) -> BTreeMap<String, JobSnapshot> {
        self.state
            .read()
            .await
            .snapshots
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Poll the server once and reconcile every monitored backup.
    ///
    /// Per-backup status calls run concurrently and fail independently;
    /// state is mutated once, after all of them have settled. Monitored ids
    /// missing from the fresh listing are reported as [`Error::NotFound`]
    /// and dropped from the monitored set. An authentication failure aborts
    /// the whole refresh: it invalidates the instance, not one backup.
    pub async fn refresh(&self) -> Result<RefreshReport, Error> {
        let _gate = self.write_gate.lock().await;
        let now = Utc::now();

        let monitored: Vec<String> = {
            let state = self.state.read().await;
            state.monitored.iter().cloned().collect()
        };

        // Membership comes from the listing; a failure here affects every
        // backup equally and is reported per backup, keeping prior
        // snapshots intact for the next attempt.
        let listing = match self.fetch_listing().await {
            Ok(jobs) => jobs,
            Err(err) if err.is_terminal() => return Err(err),
            Err(err) => {
                warn!(error = %err, "backup listing failed, reporting per backup");
                return Ok(Self::uniform_failure(monitored, err));
            }
        };

        let (present, stale): (Vec<String>, Vec<String>) = monitored
            .into_iter()
            .partition(|id| listing.iter().any(|j| &j.id == id));

        // The whole poll shares one progress observation; if we cannot get
        // it we cannot tell running from finished, so the poll is reported
        // as failed rather than guessing a transition.
        let progress = match self.endpoint.progress_state().await {
            Ok(p) => p,
            Err(err) if err.is_terminal() => return Err(err),
            Err(err) => {
                warn!(error = %err, "progress state unavailable, reporting per backup");
                let mut report = Self::uniform_failure(present, err);
                mark_not_found(&mut report.results, &stale);
                self.drop_stale(&stale).await;
                return Ok(report);
            }
        };

        let fetched = join_all(
            present
                .iter()
                .map(|id| self.endpoint.get_backup(id.as_str())),
        )
        .await;

        let mut results: BTreeMap<String, Result<JobSnapshot, Error>> = BTreeMap::new();
        let mut events = Vec::new();
        let mut vanished: Vec<String> = stale;

        {
            let mut state = self.state.write().await;
            for (id, outcome) in present.into_iter().zip(fetched) {
                match outcome {
                    Ok(definition) => {
                        let previous = state
                            .snapshots
                            .get(&id)
                            .map(|s| s.state)
                            .unwrap_or(JobState::Unknown);
                        let running = progress
                            .as_ref()
                            .is_some_and(|p| p.is_running_for(&id));
                        let snapshot =
                            JobSnapshot::observe(&definition, running, previous, now);
                        events.extend(transition_events(&id, previous, &snapshot));
                        debug!(
                            backup_id = %id,
                            state = snapshot.state.as_str(),
                            "reconciled backup"
                        );
                        state.snapshots.insert(id.clone(), snapshot.clone());
                        results.insert(id, Ok(snapshot));
                    }
                    Err(err) if err.is_terminal() => return Err(err),
                    Err(Error::NotFound(_)) => vanished.push(id),
                    Err(err) => {
                        // Transient: keep the last known good snapshot and
                        // surface the failure for this backup only.
                        debug!(backup_id = %id, error = %err, "status poll failed");
                        results.insert(id, Err(err));
                    }
                }
            }

            for id in &vanished {
                state.monitored.remove(id);
                state.snapshots.remove(id);
            }
        }

        mark_not_found(&mut results, &vanished);

        Ok(RefreshReport { results, events })
    }

    /// Ask the server to start a backup. Does not wait for completion;
    /// the next refresh observes the run.
    ///
    /// Fails with [`Error::NotFound`] before any network call when the id
    /// is not part of the last known listing, and with [`Error::Busy`]
    /// when the server already reports an active run.
    pub async fn trigger_backup(&self, backup_id: &str) -> Result<(), Error> {
        validate_backup_id(backup_id)?;

        let _gate = self.write_gate.lock().await;

        if !self.state.read().await.have_listing {
            self.fetch_listing().await?;
        }
        let known = self
            .state
            .read()
            .await
            .listing
            .iter()
            .any(|j| j.id == backup_id);
        if !known {
            return Err(Error::NotFound(backup_id.to_string()));
        }

        if let Some(progress) = self.endpoint.progress_state().await? {
            if progress.is_any_running() {
                return Err(Error::Busy(format!(
                    "backup '{}' is currently running",
                    progress.backup_id
                )));
            }
        }

        self.endpoint.run_backup(backup_id).await
    }

    fn uniform_failure(ids: Vec<String>, err: Error) -> RefreshReport {
        RefreshReport {
            results: ids
                .into_iter()
                .map(|id| (id, Err(err.clone())))
                .collect(),
            events: Vec::new(),
        }
    }

    async fn drop_stale(&self, stale: &[String]) {
        if stale.is_empty() {
            return;
        }
        let mut state = self.state.write().await;
        for id in stale {
            state.monitored.remove(id);
            state.snapshots.remove(id);
        }
    }

}

fn mark_not_found(
    results: &mut BTreeMap<String, Result<JobSnapshot, Error>>,
    stale: &[String],
) {
    for id in stale {
        results.insert(id.clone(), Err(Error::NotFound(id.clone())));
    }
}
