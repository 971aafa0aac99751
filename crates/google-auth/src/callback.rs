//! Local redirect listener for the consent flow
//!
//! A short-lived HTTP server on `127.0.0.1` that captures the authorization
//! code from the browser redirect. It answers the first request that carries
//! OAuth callback parameters, then shuts down. Requests without them (a
//! browser probing `/favicon.ico`, say) get a 404 and the listener keeps
//! waiting.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

const SUCCESS_HTML: &str = "<!DOCTYPE html><html><head><meta charset=\"utf-8\">\
<title>Authorization complete</title></head><body>\
<h1>Authorization complete</h1><p>You can close this window and return to the terminal.</p>\
</body></html>";

const FAILURE_HTML: &str = "<!DOCTYPE html><html><head><meta charset=\"utf-8\">\
<title>Authorization failed</title></head><body>\
<h1>Authorization failed</h1><p>Check the terminal for details.</p>\
</body></html>";

/// Query parameters Google appends to the redirect URI.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl CallbackParams {
    fn is_callback(&self) -> bool {
        self.code.is_some() || self.error.is_some()
    }
}

/// Validate callback parameters and extract the authorization code.
///
/// `state` is checked first: a redirect that does not carry this flow's
/// state is not an answer from the authorization server, error or not.
pub fn parse_callback(params: &CallbackParams, expected_state: &str) -> Result<String> {
    check_state(params, expected_state)?;

    if let Some(err) = &params.error {
        let description = params
            .error_description
            .as_deref()
            .unwrap_or("no description");
        return Err(Error::Callback(format!("{err} - {description}")));
    }

    params
        .code
        .clone()
        .filter(|c| !c.is_empty())
        .ok_or_else(|| Error::Callback("missing authorization code".into()))
}

fn check_state(params: &CallbackParams, expected_state: &str) -> Result<()> {
    match params.state.as_deref() {
        Some(state) if state == expected_state => Ok(()),
        Some(_) => Err(Error::Callback("state mismatch".into())),
        None => Err(Error::Callback("missing state parameter".into())),
    }
}

type CodeSender = Arc<Mutex<Option<oneshot::Sender<Result<String>>>>>;

#[derive(Clone)]
struct CallbackState {
    expected_state: Arc<str>,
    sender: CodeSender,
}

/// Bound, not yet serving, redirect listener.
pub struct CallbackServer {
    listener: TcpListener,
    port: u16,
}

impl CallbackServer {
    /// Bind the listener on `127.0.0.1:{port}`. Port 0 picks a free port.
    pub async fn bind(port: u16) -> Result<Self> {
        let addr = format!("127.0.0.1:{port}");
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| Error::Callback(format!("failed to listen on {addr}: {e}")))?;
        let port = listener
            .local_addr()
            .map_err(|e| Error::Callback(format!("listener has no local address: {e}")))?
            .port();
        info!(port, "redirect listener ready");
        Ok(Self { listener, port })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Redirect URI registered with the authorization request.
    pub fn redirect_uri(&self) -> String {
        format!("http://localhost:{}/", self.port)
    }

    /// Serve until one callback arrives or `timeout` elapses.
    ///
    /// The listener is closed before returning in every case.
    pub async fn wait_for_code(self, expected_state: &str, timeout: Duration) -> Result<String> {
        let (code_tx, code_rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let state = CallbackState {
            expected_state: Arc::from(expected_state),
            sender: Arc::new(Mutex::new(Some(code_tx))),
        };
        let app = Router::new()
            .fallback(handle_callback)
            .with_state(state);

        let server = tokio::spawn(async move {
            axum::serve(self.listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        let outcome = match tokio::time::timeout(timeout, code_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::Callback("redirect listener stopped unexpectedly".into())),
            Err(_) => Err(Error::Timeout(timeout)),
        };

        let _ = shutdown_tx.send(());
        match tokio::time::timeout(Duration::from_secs(5), server).await {
            Ok(Ok(Ok(()))) => debug!("redirect listener closed"),
            Ok(Ok(Err(e))) => warn!(error = %e, "redirect listener error during shutdown"),
            Ok(Err(e)) => warn!(error = %e, "redirect listener task panicked"),
            Err(_) => warn!("redirect listener did not shut down in time"),
        }

        outcome
    }
}

async fn handle_callback(
    State(state): State<CallbackState>,
    Query(params): Query<CallbackParams>,
) -> Response {
    if !params.is_callback() {
        return StatusCode::NOT_FOUND.into_response();
    }

    // Foreign requests are answered but do not end the wait
    if let Err(e) = check_state(&params, &state.expected_state) {
        warn!(error = %e, "ignoring redirect without this flow's state");
        return (StatusCode::BAD_REQUEST, Html(FAILURE_HTML)).into_response();
    }

    let result = parse_callback(&params, &state.expected_state);
    let page = match &result {
        Ok(_) => (StatusCode::OK, Html(SUCCESS_HTML)),
        Err(e) => {
            warn!(error = %e, "authorization redirect rejected");
            (StatusCode::BAD_REQUEST, Html(FAILURE_HTML))
        }
    };

    let sender = state
        .sender
        .lock()
        .map(|mut guard| guard.take())
        .unwrap_or_default();
    match sender {
        Some(tx) => {
            let _ = tx.send(result);
        }
        None => debug!("ignoring callback after the first one"),
    }

    page.into_response()
}
