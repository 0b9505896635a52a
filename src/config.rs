use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::api::client::ConnectionProfile;

const DEFAULT_CONFIG_PATH: &str = "/etc/dupmon/config.toml";

/// Poll cadence while no backup is running, matching the Duplicati UI's
/// five minute default.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 300;
/// Faster cadence while a run is in flight, so completion is seen promptly.
pub const DEFAULT_ACTIVE_POLL_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationChannelType {
    #[default]
    None,
    Slack,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct NotificationConfig {
    pub channel: NotificationChannelType,
    pub slack_webhook: Option<String>,
}

/// Full daemon configuration for one Duplicati server.
///
/// Layered lowest to highest: built-in defaults, the TOML config file,
/// `DUPMON_*` environment variables, CLI flags.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Base URL of the Duplicati server, e.g. `http://nas.local:8200`.
    pub server_url: String,
    pub password: Option<String>,
    pub verify_ssl: bool,
    pub poll_interval_secs: u64,
    pub active_poll_interval_secs: u64,
    pub request_timeout_secs: u64,
    /// Backup ids to monitor. Empty means every backup found on the server.
    pub backups: Vec<String>,
    pub notifications: NotificationConfig,
    pub verbose: bool,
    pub json_logs: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_url: String::new(),
            password: None,
            verify_ssl: true,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            active_poll_interval_secs: DEFAULT_ACTIVE_POLL_INTERVAL_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            backups: Vec::new(),
            notifications: NotificationConfig::default(),
            verbose: false,
            json_logs: false,
        }
    }
}

impl AppConfig {
    pub fn new<A: Serialize>(cli: Option<&A>) -> Result<Self> {
        Self::load(Self::config_path(), cli)
    }

    fn config_path() -> PathBuf {
        std::env::var_os("DUPMON_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    pub fn load<A: Serialize>(path: impl AsRef<Path>, cli: Option<&A>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("DUPMON_").split("__"));
        if let Some(cli) = cli {
            figment = figment.merge(Serialized::defaults(cli));
        }
        let config: AppConfig = figment
            .extract()
            .context("Failed to load configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.server_url.is_empty() {
            bail!("server_url is required (config file, DUPMON_SERVER_URL or --server-url)");
        }
        if !self.server_url.starts_with("http://") && !self.server_url.starts_with("https://") {
            bail!("server_url must start with http:// or https://");
        }
        if self.poll_interval_secs == 0 {
            bail!("poll_interval_secs must be greater than zero");
        }
        Ok(())
    }

    pub fn profile(&self) -> ConnectionProfile {
        ConnectionProfile {
            base_url: self.server_url.clone(),
            password: self.password.clone(),
            verify_ssl: self.verify_ssl,
            timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn active_poll_interval(&self) -> Duration {
        Duration::from_secs(self.active_poll_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_applied_under_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "server_url = \"http://nas.local:8200\"").unwrap();

        let config = AppConfig::load(file.path(), None::<&()>).unwrap();
        assert_eq!(config.server_url, "http://nas.local:8200");
        assert!(config.verify_ssl);
        assert_eq!(config.poll_interval_secs, DEFAULT_POLL_INTERVAL_SECS);
        assert!(config.backups.is_empty());
        assert_eq!(config.notifications.channel, NotificationChannelType::None);
    }

    #[test]
    fn config_file_sets_nested_sections() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
server_url = "https://nas.local:8200"
password = "secret"
verify_ssl = false
poll_interval_secs = 60
backups = ["1", "4"]

[notifications]
channel = "slack"
slack_webhook = "https://hooks.slack.com/services/T0/B0/x"
"#
        )
        .unwrap();

        let config = AppConfig::load(file.path(), None::<&()>).unwrap();
        assert_eq!(config.password.as_deref(), Some("secret"));
        assert!(!config.verify_ssl);
        assert_eq!(config.backups, vec!["1", "4"]);
        assert_eq!(config.notifications.channel, NotificationChannelType::Slack);
    }

    #[test]
    fn cli_overrides_config_file() {
        #[derive(Serialize)]
        struct Cli {
            poll_interval_secs: u64,
        }

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "server_url = \"http://nas.local:8200\"\npoll_interval_secs = 60"
        )
        .unwrap();

        let config = AppConfig::load(
            file.path(),
            Some(&Cli {
                poll_interval_secs: 15,
            }),
        )
        .unwrap();
        assert_eq!(config.poll_interval_secs, 15);
    }

    #[test]
    fn missing_server_url_is_rejected() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(AppConfig::load(file.path(), None::<&()>).is_err());
    }

    #[test]
    fn non_http_server_url_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "server_url = \"nas.local:8200\"").unwrap();
        assert!(AppConfig::load(file.path(), None::<&()>).is_err());
    }
}
