//! Failure taxonomy for credential acquisition
//!
//! Every fallible broker and collaborator operation returns [`Failure`]. Each
//! variant carries a human-readable cause because the common failures need
//! different user action: revoked consent means re-running the browser flow,
//! an unreachable factory means checking the network or the service name.

use std::fmt;

/// Tagged failure with a human-readable cause.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Failure {
    /// Cached credential unreadable or corrupt. Treated as a cache miss.
    #[error("token store read failed: {0}")]
    StoreRead(String),

    /// Persisting a credential failed. Fatal: the next run would re-prompt.
    #[error("token store write failed: {0}")]
    StoreWrite(String),

    /// Refresh token rejected or token endpoint error. Falls back to minting.
    #[error("credential refresh failed: {0}")]
    Refresh(String),

    /// User declined, the redirect never arrived, or the code exchange failed.
    #[error("interactive authorization failed: {0}")]
    InteractiveAuth(String),

    /// Client construction failed (unknown service/version, network).
    #[error("client factory failed: {0}")]
    Factory(String),

    /// The lifecycle state machine received an event it has no transition for.
    #[error("unexpected lifecycle transition: {0}")]
    Lifecycle(String),
}

/// Tag of a [`Failure`], without its cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    StoreRead,
    StoreWrite,
    Refresh,
    InteractiveAuth,
    Factory,
    Lifecycle,
}

impl Failure {
    pub fn kind(&self) -> FailureKind {
        match self {
            Failure::StoreRead(_) => FailureKind::StoreRead,
            Failure::StoreWrite(_) => FailureKind::StoreWrite,
            Failure::Refresh(_) => FailureKind::Refresh,
            Failure::InteractiveAuth(_) => FailureKind::InteractiveAuth,
            Failure::Factory(_) => FailureKind::Factory,
            Failure::Lifecycle(_) => FailureKind::Lifecycle,
        }
    }

    pub fn cause(&self) -> &str {
        match self {
            Failure::StoreRead(cause)
            | Failure::StoreWrite(cause)
            | Failure::Refresh(cause)
            | Failure::InteractiveAuth(cause)
            | Failure::Factory(cause)
            | Failure::Lifecycle(cause) => cause,
        }
    }
}

impl FailureKind {
    /// Stable label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            FailureKind::StoreRead => "store_read",
            FailureKind::StoreWrite => "store_write",
            FailureKind::Refresh => "refresh",
            FailureKind::InteractiveAuth => "interactive_auth",
            FailureKind::Factory => "factory",
            FailureKind::Lifecycle => "lifecycle",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Result alias for broker operations.
pub type Result<T> = std::result::Result<T, Failure>;
