//! Installed-application authorization flow
//!
//! Ties the pieces of this crate together behind the broker's
//! [`AuthorizationFlow`] seam: client-secret loading, PKCE, the consent URL,
//! the local redirect listener and the token endpoint.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use credential_broker::{
    AuthSource, AuthorizationFlow, BoxFuture, Credential, Failure, ScopeSet, now_millis,
};
use tracing::{info, warn};

use crate::callback::CallbackServer;
use crate::client_secret::ClientSecret;
use crate::constants::{CALLBACK_PORT, CONSENT_TIMEOUT};
use crate::error::Result;
use crate::pkce::{build_authorization_url, compute_challenge, generate_verifier};
use crate::token::{exchange_code, refresh_token};

/// Presents the consent URL to the user.
pub type UrlOpener = Arc<dyn Fn(&str) + Send + Sync>;

/// Browser-based consent with a loopback redirect.
#[derive(Clone)]
pub struct InstalledAppFlow {
    http: reqwest::Client,
    callback_port: u16,
    timeout: Duration,
    opener: UrlOpener,
}

impl InstalledAppFlow {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            callback_port: CALLBACK_PORT,
            timeout: CONSENT_TIMEOUT,
            opener: Arc::new(open_in_browser),
        }
    }

    /// Port for the redirect listener. 0 picks a free one.
    pub fn with_callback_port(mut self, port: u16) -> Self {
        self.callback_port = port;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_opener(mut self, opener: UrlOpener) -> Self {
        self.opener = opener;
        self
    }

    /// Print the consent URL instead of launching a browser.
    pub fn without_browser(self) -> Self {
        self.with_opener(Arc::new(|url: &str| {
            info!(%url, "open this URL in a browser to authorize access");
        }))
    }

    async fn mint(&self, source: &AuthSource, scopes: &ScopeSet) -> Result<Credential> {
        let client = ClientSecret::load(source.client_secret_file()).await?;
        let server = CallbackServer::bind(self.callback_port).await?;
        let redirect_uri = server.redirect_uri();

        let state = uuid::Uuid::new_v4().to_string();
        let verifier = generate_verifier();
        let challenge = compute_challenge(&verifier);
        let url = build_authorization_url(&client, &redirect_uri, scopes, &state, &challenge)?;

        info!(scopes = %scopes, port = server.port(), "waiting for user consent");
        (self.opener)(&url);

        let code = server.wait_for_code(&state, self.timeout).await?;
        let token = exchange_code(&self.http, &client, &code, &verifier, &redirect_uri).await?;

        let granted = granted_scopes(token.scope.as_deref()).unwrap_or_else(|| scopes.clone());
        if token.refresh_token.is_none() {
            warn!("token endpoint issued no refresh token, the next expiry needs consent again");
        }
        Ok(Credential::issued(
            token.access_token,
            token.refresh_token,
            token.expires_in,
            granted,
            now_millis(),
        ))
    }

    async fn renew(&self, source: &AuthSource, credential: &Credential) -> Result<Credential> {
        let client = ClientSecret::load(source.client_secret_file()).await?;
        let refresh = credential.refresh_token.as_deref().unwrap_or_default();
        let token = refresh_token(&self.http, &client, refresh).await?;

        Ok(credential.renewed(
            token.access_token,
            token.refresh_token,
            token.expires_in,
            granted_scopes(token.scope.as_deref()),
            now_millis(),
        ))
    }
}

impl fmt::Debug for InstalledAppFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstalledAppFlow")
            .field("callback_port", &self.callback_port)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl AuthorizationFlow for InstalledAppFlow {
    fn start_interactive<'a>(
        &'a self,
        source: &'a AuthSource,
        scopes: &'a ScopeSet,
    ) -> BoxFuture<'a, credential_broker::Result<Credential>> {
        Box::pin(async move {
            self.mint(source, scopes)
                .await
                .map_err(|e| e.into_interactive_failure())
        })
    }

    fn refresh<'a>(
        &'a self,
        source: &'a AuthSource,
        credential: &'a Credential,
    ) -> BoxFuture<'a, credential_broker::Result<Credential>> {
        Box::pin(async move {
            if !credential.can_refresh() {
                return Err(Failure::Refresh("credential has no refresh token".into()));
            }
            self.renew(source, credential)
                .await
                .map_err(|e| e.into_refresh_failure())
        })
    }
}

/// Scopes named in a token response, if it named any usable ones.
fn granted_scopes(scope: Option<&str>) -> Option<ScopeSet> {
    scope.and_then(|s| ScopeSet::parse(s).ok())
}

fn open_in_browser(url: &str) {
    if let Err(e) = open::that(url) {
        warn!(error = %e, %url, "could not launch a browser, open the URL manually");
    } else {
        info!("opened consent page in the browser");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::tests::start_token_server;
    use axum::http::StatusCode;
    use credential_broker::FailureKind;
    use std::collections::HashMap;
    use std::path::Path;
    use tokio::sync::mpsc;
    use url::Url;

    const DRIVE: &str = "https://www.googleapis.com/auth/drive";

    async fn write_client_secret(dir: &Path, token_uri: &str) -> AuthSource {
        let path = dir.join("client_secret.json");
        let json = serde_json::json!({
            "installed": {
                "client_id": "id-123",
                "client_secret": "GOCSPX-s",
                "token_uri": token_uri,
            }
        });
        tokio::fs::write(&path, json.to_string()).await.unwrap();
        AuthSource::new(path)
    }

    /// Flow whose opener hands the consent URL to the test.
    fn capturing_flow() -> (InstalledAppFlow, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let flow = InstalledAppFlow::new(reqwest::Client::new())
            .with_callback_port(0)
            .with_timeout(Duration::from_secs(10))
            .with_opener(Arc::new(move |url: &str| {
                let _ = tx.send(url.to_owned());
            }));
        (flow, rx)
    }

    /// Play the browser: read the consent URL and follow the redirect.
    async fn approve(mut urls: mpsc::UnboundedReceiver<String>, code: &str) {
        let url = Url::parse(&urls.recv().await.unwrap()).unwrap();
        let params: HashMap<String, String> = url.query_pairs().into_owned().collect();
        let redirect = Url::parse(&params["redirect_uri"]).unwrap();
        let port = redirect.port().unwrap();

        let callback = Url::parse_with_params(
            &format!("http://127.0.0.1:{port}/"),
            &[("code", code), ("state", params["state"].as_str())],
        )
        .unwrap();
        reqwest::Client::new()
            .get(callback)
            .send()
            .await
            .unwrap();
    }

    fn credential(refresh: Option<&str>) -> Credential {
        Credential::issued(
            "ya29.old".into(),
            refresh.map(str::to_owned),
            0,
            ScopeSet::new([DRIVE]).unwrap(),
            1_000,
        )
    }

    #[test]
    fn defaults_to_fixed_port_and_consent_timeout() {
        let flow = InstalledAppFlow::new(reqwest::Client::new());
        assert_eq!(flow.callback_port, CALLBACK_PORT);
        assert_eq!(flow.callback_port, 8002);
        assert_eq!(flow.timeout, CONSENT_TIMEOUT);
        assert_eq!(flow.timeout, Duration::from_secs(300));

        let debug = format!("{flow:?}");
        assert!(debug.contains("callback_port: 8002"), "got: {debug}");
    }

    #[tokio::test]
    async fn interactive_flow_mints_credential_from_redirect() {
        let (token_uri, received) = start_token_server(
            StatusCode::OK,
            serde_json::json!({
                "access_token": "ya29.fresh",
                "refresh_token": "1//rt",
                "expires_in": 3599,
                "scope": DRIVE,
                "token_type": "Bearer"
            }),
        )
        .await;
        let dir = tempfile::tempdir().unwrap();
        let source = write_client_secret(dir.path(), &token_uri).await;
        let (flow, urls) = capturing_flow();
        let browser = tokio::spawn(approve(urls, "4/granted"));

        let scopes = ScopeSet::new([DRIVE]).unwrap();
        let minted = flow.start_interactive(&source, &scopes).await.unwrap();
        browser.await.unwrap();

        assert_eq!(minted.access_token, "ya29.fresh");
        assert_eq!(minted.refresh_token.as_deref(), Some("1//rt"));
        assert!(minted.grants(&scopes));
        assert!(!minted.is_expired());

        let form = received.lock().unwrap()[0].clone();
        assert_eq!(form["code"], "4/granted");
        assert_eq!(form["grant_type"], "authorization_code");
        assert!(form["redirect_uri"].starts_with("http://localhost:"));
    }

    #[tokio::test]
    async fn missing_scope_in_response_falls_back_to_requested() {
        let (token_uri, _) = start_token_server(
            StatusCode::OK,
            serde_json::json!({"access_token": "ya29.a", "refresh_token": "1//rt", "expires_in": 3599}),
        )
        .await;
        let dir = tempfile::tempdir().unwrap();
        let source = write_client_secret(dir.path(), &token_uri).await;
        let (flow, urls) = capturing_flow();
        let browser = tokio::spawn(approve(urls, "4/c"));

        let scopes = ScopeSet::new([DRIVE]).unwrap();
        let minted = flow.start_interactive(&source, &scopes).await.unwrap();
        browser.await.unwrap();
        assert_eq!(minted.scopes, scopes);
    }

    #[tokio::test]
    async fn consent_timeout_is_interactive_failure() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_client_secret(dir.path(), "http://127.0.0.1:1/token").await;
        let (flow, _urls) = capturing_flow();
        let flow = flow.with_timeout(Duration::from_millis(50));

        let err = flow
            .start_interactive(&source, &ScopeSet::new([DRIVE]).unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::InteractiveAuth);
        assert!(err.cause().contains("timed out"), "got: {err}");
    }

    #[tokio::test]
    async fn missing_client_secret_is_interactive_failure() {
        let flow = InstalledAppFlow::new(reqwest::Client::new()).without_browser();
        let source = AuthSource::new("/nonexistent/client_secret.json");
        let err = flow
            .start_interactive(&source, &ScopeSet::new([DRIVE]).unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::InteractiveAuth);
    }

    #[tokio::test]
    async fn refresh_keeps_refresh_token_and_scopes() {
        let (token_uri, received) = start_token_server(
            StatusCode::OK,
            serde_json::json!({"access_token": "ya29.new", "expires_in": 3599}),
        )
        .await;
        let dir = tempfile::tempdir().unwrap();
        let source = write_client_secret(dir.path(), &token_uri).await;
        let flow = InstalledAppFlow::new(reqwest::Client::new()).without_browser();

        let old = credential(Some("1//rt"));
        let renewed = flow.refresh(&source, &old).await.unwrap();

        assert_eq!(renewed.access_token, "ya29.new");
        assert_eq!(renewed.refresh_token.as_deref(), Some("1//rt"));
        assert_eq!(renewed.scopes, old.scopes);
        assert!(!renewed.is_expired());
        assert_eq!(received.lock().unwrap()[0]["refresh_token"], "1//rt");
    }

    #[tokio::test]
    async fn revoked_refresh_is_refresh_failure() {
        let (token_uri, _) = start_token_server(
            StatusCode::BAD_REQUEST,
            serde_json::json!({"error": "invalid_grant"}),
        )
        .await;
        let dir = tempfile::tempdir().unwrap();
        let source = write_client_secret(dir.path(), &token_uri).await;
        let flow = InstalledAppFlow::new(reqwest::Client::new()).without_browser();

        let err = flow
            .refresh(&source, &credential(Some("1//revoked")))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::Refresh);
        assert!(err.cause().contains("invalid_grant"));
    }

    #[tokio::test]
    async fn refresh_without_refresh_token_fails_fast() {
        let flow = InstalledAppFlow::new(reqwest::Client::new()).without_browser();
        let source = AuthSource::new("/nonexistent/client_secret.json");
        let err = flow.refresh(&source, &credential(None)).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::Refresh);
        assert!(err.cause().contains("no refresh token"));
    }
}
