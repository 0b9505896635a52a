use thiserror::Error;

/// Errors surfaced by the monitor and the Duplicati client.
///
/// `Auth` is terminal for the whole monitor instance: the server rejected our
/// credential and nothing will succeed until the configuration changes. All
/// other variants are scoped to a single request and are reported per backup
/// during a refresh.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    /// Network-level failure: DNS, connect, TLS or timeout.
    #[error("connection to backup server failed: {0}")]
    Connection(String),

    /// The server rejected the configured credential.
    #[error("authentication rejected by backup server: {0}")]
    Auth(String),

    /// The referenced backup no longer exists on the server.
    #[error("backup '{0}' does not exist on the server")]
    NotFound(String),

    /// The server answered with an unexpected shape or status.
    #[error("unexpected response from backup server: {0}")]
    Protocol(String),

    /// The server is already executing a backup and refused to queue another.
    #[error("backup server is busy: {0}")]
    Busy(String),
}

impl Error {
    /// Whether the error invalidates the whole monitor instance rather than
    /// a single backup's poll.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Error::Auth(_))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            Error::Connection(err.to_string())
        } else if err.is_decode() {
            Error::Protocol(err.to_string())
        } else if let Some(status) = err.status() {
            match status.as_u16() {
                401 | 403 => Error::Auth(err.to_string()),
                404 => Error::NotFound(err.to_string()),
                _ => Error::Protocol(format!("server returned {status}")),
            }
        } else {
            Error::Connection(err.to_string())
        }
    }
}
