//! Discovery-document client factory
//!
//! Builds a [`ServiceClient`] for a Google API from its public discovery
//! document. The document is only used to validate that the (name, version)
//! pair exists and to learn the API's base URL; request methods are not
//! generated from it.

use common::Secret;
use credential_broker::{
    BoxFuture, ClientFactory, Credential, Failure, ScopeSet, ServiceIdentity,
};
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Subset of a discovery document needed to address the API.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DiscoveryDocument {
    root_url: String,
    #[serde(default)]
    service_path: String,
    #[serde(default)]
    title: Option<String>,
}

/// [`ClientFactory`] backed by the discovery service at `discovery_root`.
#[derive(Debug, Clone)]
pub struct DiscoveryClientFactory {
    http: reqwest::Client,
    discovery_root: String,
}

impl DiscoveryClientFactory {
    pub fn new(http: reqwest::Client, discovery_root: impl Into<String>) -> Self {
        Self {
            http,
            discovery_root: discovery_root.into().trim_end_matches('/').to_owned(),
        }
    }

    fn document_url(&self, identity: &ServiceIdentity) -> String {
        format!(
            "{}/discovery/v1/apis/{}/{}/rest",
            self.discovery_root,
            identity.name(),
            identity.version()
        )
    }

    async fn fetch(
        &self,
        identity: &ServiceIdentity,
    ) -> credential_broker::Result<DiscoveryDocument> {
        let url = self.document_url(identity);
        debug!(%url, "fetching discovery document");

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| {
                Failure::Factory(format!("discovery request for {identity} failed: {e}"))
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(Failure::Factory(format!(
                "unknown API {identity}: no discovery document"
            )));
        }
        if !status.is_success() {
            return Err(Failure::Factory(format!(
                "discovery for {identity} returned {status}"
            )));
        }

        response
            .json::<DiscoveryDocument>()
            .await
            .map_err(|e| {
                Failure::Factory(format!("invalid discovery document for {identity}: {e}"))
            })
    }
}

impl ClientFactory for DiscoveryClientFactory {
    type Handle = ServiceClient;

    fn build<'a>(
        &'a self,
        identity: &'a ServiceIdentity,
        credential: &'a Credential,
    ) -> BoxFuture<'a, credential_broker::Result<ServiceClient>> {
        Box::pin(async move {
            let document = self.fetch(identity).await?;
            let base_url = format!("{}{}", document.root_url, document.service_path);
            info!(
                service = identity.name(),
                version = identity.version(),
                title = document.title.as_deref().unwrap_or_default(),
                %base_url,
                "API client ready"
            );
            Ok(ServiceClient {
                http: self.http.clone(),
                base_url,
                token: Secret::new(credential.access_token.clone()),
                scopes: credential.scopes.clone(),
            })
        })
    }
}

/// Authenticated handle for one Google API.
#[derive(Debug, Clone)]
pub struct ServiceClient {
    http: reqwest::Client,
    base_url: String,
    token: Secret<String>,
    scopes: ScopeSet,
}

impl ServiceClient {
    /// `rootUrl + servicePath` from the discovery document.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn scopes(&self) -> &ScopeSet {
        &self.scopes
    }

    /// GET `path` relative to the base URL and decode the JSON body.
    pub async fn get(&self, path: &str) -> Result<serde_json::Value> {
        let url = format!("{}{}", self.base_url, path.trim_start_matches('/'));
        let response = self
            .http
            .get(&url)
            .bearer_auth(self.token.expose())
            .send()
            .await
            .map_err(|e| Error::Request {
                url: url.clone(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Status {
                url,
                status: status.as_u16(),
                body,
            });
        }

        response.json().await.map_err(|e| Error::Decode {
            url,
            message: e.to_string(),
        })
    }
}
