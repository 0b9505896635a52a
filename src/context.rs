use std::sync::Arc;

use crate::config::AppConfig;
use crate::core::BackupMonitor;
use crate::core::notifications::NotificationChannel;

/// Shared handles for one configured server, passed around the daemon.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<AppConfig>,
    pub monitor: Arc<BackupMonitor>,
    pub notifier: Option<Arc<dyn NotificationChannel>>,
}

impl AppContext {
    pub fn new(
        config: AppConfig,
        monitor: BackupMonitor,
        notifier: Option<Arc<dyn NotificationChannel>>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            monitor: Arc::new(monitor),
            notifier,
        }
    }
}
