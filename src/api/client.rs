//! REST client for the Duplicati server API.
//!
//! Authentication uses the JWT login endpoint: the password is exchanged
//! for an access token which is cached and sent as a bearer header. When
//! the server rejects a cached token the client logs in again once; a
//! rejection of the password itself is terminal.

use std::time::Duration;

use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::debug;

use super::models::{
    BackupDefinition, LoginResponse, ProgressState, RunBackupResponse, SystemInfo,
};
use crate::core::endpoint::BackupEndpoint;
use crate::core::error::Error;

/// Connection settings for one Duplicati server. Owned by a single client
/// instance; never shared between instances.
#[derive(Debug, Clone)]
pub struct ConnectionProfile {
    pub base_url: String,
    pub password: Option<String>,
    pub verify_ssl: bool,
    pub timeout: Duration,
}

pub struct DuplicatiClient {
    http: reqwest::Client,
    base_url: String,
    password: Option<String>,
    token: Mutex<Option<String>>,
}

impl DuplicatiClient {
    pub fn new(profile: &ConnectionProfile) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(profile.timeout)
            .danger_accept_invalid_certs(!profile.verify_ssl)
            .build()
            .map_err(|e| Error::Connection(e.to_string()))?;

        Ok(Self {
            http,
            base_url: profile.base_url.trim_end_matches('/').to_string(),
            password: profile.password.clone(),
            token: Mutex::new(None),
        })
    }

    /// Host portion of the server URL, for log messages.
    pub fn host(&self) -> &str {
        self.base_url
            .strip_prefix("https://")
            .or_else(|| self.base_url.strip_prefix("http://"))
            .unwrap_or(&self.base_url)
    }

    async fn login(&self, password: &str) -> Result<String, Error> {
        let url = format!("{}/api/v1/auth/login", self.base_url);
        debug!(host = self.host(), "logging in");
        let response = self
            .http
            .post(&url)
            .json(&json!({ "Password": password }))
            .send()
            .await
            .map_err(Error::from)?;

        match response.status() {
            s if s.is_success() => {
                let body: LoginResponse = response
                    .json()
                    .await
                    .map_err(|e| Error::Protocol(format!("login response: {e}")))?;
                Ok(body.access_token)
            }
            StatusCode::UNAUTHORIZED => {
                Err(Error::Auth("incorrect password provided".to_string()))
            }
            s => Err(Error::Protocol(format!("login failed with status {s}"))),
        }
    }

    /// Return the cached access token, logging in first if necessary.
    async fn ensure_token(&self) -> Result<Option<String>, Error> {
        let Some(password) = &self.password else {
            return Ok(None);
        };
        let mut guard = self.token.lock().await;
        if let Some(token) = guard.as_ref() {
            return Ok(Some(token.clone()));
        }
        let token = self.login(password).await?;
        *guard = Some(token.clone());
        Ok(Some(token))
    }

    /// Issue a request, re-authenticating once when a cached token has
    /// expired. A second rejection means the credential itself is bad.
    async fn send(&self, method: Method, path: &str) -> Result<Response, Error> {
        let url = format!("{}{}", self.base_url, path);
        let mut attempted_relogin = false;

        loop {
            let mut request = self.http.request(method.clone(), &url);
            if let Some(token) = self.ensure_token().await? {
                request = request.bearer_auth(token);
            }
            let response = request.send().await.map_err(Error::from)?;

            if response.status() == StatusCode::UNAUTHORIZED {
                if self.password.is_some() && !attempted_relogin {
                    debug!(path, "access token rejected, logging in again");
                    self.token.lock().await.take();
                    attempted_relogin = true;
                    continue;
                }
                return Err(Error::Auth(
                    "server rejected the configured credential".to_string(),
                ));
            }

            return Ok(response);
        }
    }

    async fn parse<T: DeserializeOwned>(
        response: Response,
        resource: &str,
    ) -> Result<T, Error> {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(Error::NotFound(resource.to_string()));
        }
        if !status.is_success() {
            return Err(Error::Protocol(format!(
                "'{resource}' returned status {status}"
            )));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| Error::Protocol(format!("decoding '{resource}': {e}")))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        resource: &str,
    ) -> Result<T, Error> {
        let response = self.send(Method::GET, path).await?;
        Self::parse(response, resource).await
    }
}

/// Backup ids are numeric on the server; reject anything else before it
/// ends up in a request path.
pub(crate) fn validate_backup_id(backup_id: &str) -> Result<(), Error> {
    if backup_id.is_empty() || !backup_id.chars().all(|c| c.is_ascii_digit()) {
        return Err(Error::NotFound(backup_id.to_string()));
    }
    Ok(())
}

#[async_trait::async_trait]
impl BackupEndpoint for DuplicatiClient {
    async fn list_backups(&self) -> Result<Vec<BackupDefinition>, Error> {
        self.get_json("/api/v1/Backups", "backup listing").await
    }

    async fn get_backup(&self, backup_id: &str) -> Result<BackupDefinition, Error> {
        validate_backup_id(backup_id)?;
        let path = format!("/api/v1/Backup/{backup_id}");
        let response = self.send(Method::GET, &path).await?;
        Self::parse(response, backup_id).await
    }

    async fn progress_state(&self) -> Result<Option<ProgressState>, Error> {
        let response = self.send(Method::GET, "/api/v1/ProgressState").await?;
        // The server answers 404 when no task has run since startup.
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Self::parse(response, "progress state").await.map(Some)
    }

    async fn run_backup(&self, backup_id: &str) -> Result<(), Error> {
        validate_backup_id(backup_id)?;
        let path = format!("/api/v1/Backup/{backup_id}/run");
        let response = self.send(Method::POST, &path).await?;
        let body: RunBackupResponse = Self::parse(response, backup_id).await?;
        match body.status.as_deref() {
            Some("OK") => Ok(()),
            Some(other) => Err(Error::Protocol(format!(
                "backup run request answered with status '{other}'"
            ))),
            None => Err(Error::Protocol(
                "no status received in backup run response".to_string(),
            )),
        }
    }

    async fn system_info(&self) -> Result<SystemInfo, Error> {
        self.get_json("/api/v1/SystemInfo", "system info").await
    }
}
