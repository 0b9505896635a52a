//! Transport seam between the monitor and the backup server.
//!
//! Whether status is fetched one call per backup or through a batched
//! listing is a property of the server API, not of the monitor, so the
//! monitor only talks to this trait. The real implementation lives in
//! [`crate::api::client::DuplicatiClient`]; tests drive the monitor
//! through [`crate::core::simulated::SimulatedServer`].

use async_trait::async_trait;

use crate::api::models::{BackupDefinition, ProgressState, SystemInfo};
use crate::core::error::Error;

#[async_trait]
pub trait BackupEndpoint: Send + Sync {
    /// All backups configured on the server, in server order.
    async fn list_backups(&self) -> Result<Vec<BackupDefinition>, Error>;

    /// Definition and run metadata of a single backup.
    async fn get_backup(&self, backup_id: &str) -> Result<BackupDefinition, Error>;

    /// Progress of the currently executing backup. `None` means the server
    /// reports no active task.
    async fn progress_state(&self) -> Result<Option<ProgressState>, Error>;

    /// Ask the server to start a backup. Returns as soon as the server has
    /// accepted the request; completion is observed by later polls.
    async fn run_backup(&self, backup_id: &str) -> Result<(), Error>;

    /// Server identification, used as a connectivity and credential check.
    async fn system_info(&self) -> Result<SystemInfo, Error>;
}
