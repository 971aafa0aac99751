//! Google API client bootstrap
//!
//! Single-binary caller of the credential broker that:
//! 1. Loads the service identity and OAuth settings from TOML
//! 2. Reuses, refreshes or interactively mints a credential for it
//! 3. Builds an authenticated client from the API's discovery document
//! 4. Optionally issues one GET (`--get <path>`) and prints the JSON body

mod config;
mod discovery;
mod error;

use std::sync::Arc;

use anyhow::{Context, Result};
use credential_broker::{CredentialBroker, FileTokenStore};
use google_auth::InstalledAppFlow;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::discovery::DiscoveryClientFactory;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting google-service");

    let args: Vec<String> = std::env::args().collect();
    let config_path = Config::resolve_path(flag_value(&args, "--config"));
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    let identity = config.identity()?;

    info!(
        service = identity.name(),
        version = identity.version(),
        scopes = %identity.scopes(),
        token_dir = %config.auth.token_dir.display(),
        "configuration loaded"
    );

    let http = reqwest::Client::new();

    let mut flow = InstalledAppFlow::new(http.clone())
        .with_callback_port(config.auth.callback_port)
        .with_timeout(config.consent_timeout());
    if !config.auth.open_browser {
        flow = flow.without_browser();
    }

    let broker = CredentialBroker::new(
        Arc::new(FileTokenStore::new(&config.auth.token_dir)),
        Arc::new(flow),
        DiscoveryClientFactory::new(http, &config.service.discovery_url),
    );

    let client = match broker.acquire_client(&identity, &config.auth_source()).await {
        Ok(client) => client,
        Err(failure) => {
            error!(kind = %failure.kind(), cause = failure.cause(), "credential acquisition failed");
            anyhow::bail!("{identity}: {} failure: {}", failure.kind(), failure.cause());
        }
    };

    info!(base_url = client.base_url(), "client ready");

    if let Some(path) = flag_value(&args, "--get") {
        let body = client
            .get(path)
            .await
            .with_context(|| format!("GET {path} failed"))?;
        println!("{}", serde_json::to_string_pretty(&body)?);
    }

    Ok(())
}

/// Value following `flag` on the command line, if any.
fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
}
