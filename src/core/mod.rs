pub mod endpoint;
pub mod error;
pub mod events;
pub mod models;
pub mod monitor;
pub mod notifications;
pub mod simulated;

pub use endpoint::BackupEndpoint;
pub use error::Error;
pub use events::{JobEvent, transition_events};
pub use models::{BackupJob, JobSnapshot, JobState};
pub use monitor::{BackupMonitor, RefreshReport};
pub use simulated::{SimulatedServer, Simulator};
