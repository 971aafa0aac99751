//! OAuth client-secret file parsing
//!
//! Google Cloud Console downloads client credentials as JSON with a single
//! top-level key naming the application type:
//!
//! ```json
//! {"installed": {"client_id": "...", "client_secret": "...",
//!                "auth_uri": "...", "token_uri": "...", "redirect_uris": ["http://localhost"]}}
//! ```
//!
//! Both `installed` and `web` clients are accepted. Endpoint URIs fall back to
//! Google's defaults when absent.

use std::path::Path;

use common::Secret;
use serde::Deserialize;

use crate::constants::{AUTH_URI, TOKEN_URI};
use crate::error::{Error, Result};

/// Client identity used for consent and token requests.
#[derive(Debug, Clone)]
pub struct ClientSecret {
    pub client_id: String,
    pub client_secret: Secret<String>,
    pub auth_uri: String,
    pub token_uri: String,
}

#[derive(Deserialize)]
struct ClientSecretFile {
    installed: Option<ClientSecretEntry>,
    web: Option<ClientSecretEntry>,
}

#[derive(Deserialize)]
struct ClientSecretEntry {
    client_id: String,
    client_secret: String,
    auth_uri: Option<String>,
    token_uri: Option<String>,
}

impl ClientSecret {
    /// Read and parse a client-secret file.
    pub async fn load(path: &Path) -> Result<Self> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::Io(format!("reading client secret {}: {e}", path.display())))?;
        Self::parse(&contents).map_err(|e| match e {
            Error::ClientSecret(msg) => Error::ClientSecret(format!("{}: {msg}", path.display())),
            other => other,
        })
    }

    /// Parse client-secret JSON.
    pub fn parse(json: &str) -> Result<Self> {
        let file: ClientSecretFile = serde_json::from_str(json)
            .map_err(|e| Error::ClientSecret(format!("invalid client secret JSON: {e}")))?;

        let entry = file.installed.or(file.web).ok_or_else(|| {
            Error::ClientSecret("expected an \"installed\" or \"web\" client entry".into())
        })?;

        if entry.client_id.trim().is_empty() {
            return Err(Error::ClientSecret("client_id is empty".into()));
        }
        if entry.client_secret.trim().is_empty() {
            return Err(Error::ClientSecret("client_secret is empty".into()));
        }

        Ok(Self {
            client_id: entry.client_id,
            client_secret: Secret::new(entry.client_secret),
            auth_uri: entry.auth_uri.unwrap_or_else(|| AUTH_URI.to_owned()),
            token_uri: entry.token_uri.unwrap_or_else(|| TOKEN_URI.to_owned()),
        })
    }
}
