//! Error types for Google OAuth operations

use std::time::Duration;

use credential_broker::Failure;

/// Errors from Google OAuth operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("client secret error: {0}")]
    ClientSecret(String),

    #[error("authorization callback failed: {0}")]
    Callback(String),

    #[error("timed out after {0:?} waiting for the authorization redirect")]
    Timeout(Duration),

    #[error("I/O error: {0}")]
    Io(String),
}

impl Error {
    /// Broker failure for an error raised while minting.
    pub fn into_interactive_failure(self) -> Failure {
        Failure::InteractiveAuth(self.to_string())
    }

    /// Broker failure for an error raised while refreshing.
    pub fn into_refresh_failure(self) -> Failure {
        Failure::Refresh(self.to_string())
    }
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;
