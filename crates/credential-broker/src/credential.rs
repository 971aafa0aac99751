//! The OAuth credential value
//!
//! `expires` is a unix timestamp in milliseconds (absolute, not a delta),
//! computed when the credential is minted or refreshed from the token
//! endpoint's `expires_in` seconds delta plus the current time.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::identity::ScopeSet;

/// A credential expiring within this window counts as expired, so a token
/// handed to the client factory is not already dead on first use.
pub const EXPIRY_SKEW_MILLIS: u64 = 60_000;

/// Access/refresh token pair with expiry and granted scopes.
///
/// Immutable by convention: a refresh produces a new value via
/// [`Credential::renewed`] instead of mutating the cached one.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Bearer token for API calls
    pub access_token: String,
    /// Long-lived token for obtaining new access tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Expiration as unix timestamp in milliseconds
    pub expires: u64,
    /// Scopes the authorization server actually granted
    pub scopes: ScopeSet,
}

impl Credential {
    /// Build a credential from a token endpoint answer received at `now_millis`.
    pub fn issued(
        access_token: String,
        refresh_token: Option<String>,
        expires_in_secs: u64,
        scopes: ScopeSet,
        now_millis: u64,
    ) -> Self {
        Self {
            access_token,
            refresh_token,
            expires: now_millis.saturating_add(expires_in_secs.saturating_mul(1000)),
            scopes,
        }
    }

    /// New credential produced by a refresh of `self`.
    ///
    /// Token endpoints usually omit the refresh token and scope on refresh;
    /// missing values carry over from the previous credential.
    pub fn renewed(
        &self,
        access_token: String,
        refresh_token: Option<String>,
        expires_in_secs: u64,
        scopes: Option<ScopeSet>,
        now_millis: u64,
    ) -> Self {
        Self::issued(
            access_token,
            refresh_token.or_else(|| self.refresh_token.clone()),
            expires_in_secs,
            scopes.unwrap_or_else(|| self.scopes.clone()),
            now_millis,
        )
    }

    pub fn is_expired_at(&self, now_millis: u64) -> bool {
        self.expires <= now_millis.saturating_add(EXPIRY_SKEW_MILLIS)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now_millis())
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Whether this credential was granted every scope in `requested`.
    pub fn grants(&self, requested: &ScopeSet) -> bool {
        self.scopes.covers(requested)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires", &self.expires)
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// Current time as unix milliseconds.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
