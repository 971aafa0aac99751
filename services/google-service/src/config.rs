//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The OAuth client secret itself never lives in the TOML; the file only
//! points at the client-secret JSON downloaded from the Cloud Console.

use credential_broker::{AuthSource, ScopeSet, ServiceIdentity};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub auth: AuthConfig,
    pub service: ServiceConfig,
}

/// OAuth client and token cache settings
#[derive(Debug, Deserialize)]
pub struct AuthConfig {
    /// Path to the client-secret JSON (overridden by GOOGLE_CLIENT_SECRET_FILE)
    pub client_secret_file: PathBuf,
    /// Directory holding `token_{service}_{version}.json`
    #[serde(default = "default_token_dir")]
    pub token_dir: PathBuf,
    #[serde(default = "default_callback_port")]
    pub callback_port: u16,
    #[serde(default = "default_consent_timeout")]
    pub consent_timeout_secs: u64,
    /// Launch the system browser for consent; otherwise only log the URL
    #[serde(default = "default_open_browser")]
    pub open_browser: bool,
}

/// Target API settings
#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub version: String,
    pub scopes: Vec<String>,
    #[serde(default = "default_discovery_url")]
    pub discovery_url: String,
}

fn default_token_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_callback_port() -> u16 {
    google_auth::CALLBACK_PORT
}

fn default_consent_timeout() -> u64 {
    google_auth::CONSENT_TIMEOUT.as_secs()
}

fn default_open_browser() -> bool {
    true
}

fn default_discovery_url() -> String {
    "https://www.googleapis.com".into()
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if !config.service.discovery_url.starts_with("http://")
            && !config.service.discovery_url.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "discovery_url must start with http:// or https://, got: {}",
                config.service.discovery_url
            )));
        }

        if config.auth.consent_timeout_secs == 0 {
            return Err(common::Error::Config(
                "consent_timeout_secs must be greater than 0".into(),
            ));
        }

        if let Ok(file) = std::env::var("GOOGLE_CLIENT_SECRET_FILE")
            && !file.trim().is_empty()
        {
            config.auth.client_secret_file = PathBuf::from(file);
        }

        // Surface identity problems at load time rather than mid-acquisition
        config.identity()?;

        Ok(config)
    }

    /// Service identity the broker acquires a client for.
    pub fn identity(&self) -> common::Result<ServiceIdentity> {
        let scopes = ScopeSet::new(&self.service.scopes)
            .map_err(|e| common::Error::Config(format!("service.scopes: {e}")))?;
        ServiceIdentity::new(&self.service.name, &self.service.version, scopes)
            .map_err(|e| common::Error::Config(format!("service: {e}")))
    }

    pub fn auth_source(&self) -> AuthSource {
        AuthSource::new(&self.auth.client_secret_file)
    }

    pub fn consent_timeout(&self) -> Duration {
        Duration::from_secs(self.auth.consent_timeout_secs)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("google-service.toml")
    }
}
