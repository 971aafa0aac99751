//! OAuth token exchange and refresh
//!
//! Handles the two token endpoint interactions:
//! 1. Authorization code exchange (completes the interactive flow)
//! 2. Token refresh
//!
//! Both POST a form to the client's `token_uri` with different grant types.
//! Google requires the client secret on both, even for installed apps.

use serde::{Deserialize, Serialize};

use crate::client_secret::ClientSecret;
use crate::error::{Error, Result};

/// Response from the token endpoint for both exchange and refresh.
///
/// `expires_in` is a delta in seconds from the response time. Google omits
/// `refresh_token` on most refresh responses and may omit `scope`.
#[derive(Debug, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Seconds until the access token expires (delta, not absolute)
    pub expires_in: u64,
    /// Space-delimited granted scopes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

/// Error body returned by Google's token endpoint.
#[derive(Debug, Deserialize)]
struct TokenError {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Exchange an authorization code for tokens.
///
/// The `verifier` proves this process started the flow whose challenge the
/// user approved; `redirect_uri` must match the one in the consent URL.
pub async fn exchange_code(
    http: &reqwest::Client,
    client: &ClientSecret,
    code: &str,
    verifier: &str,
    redirect_uri: &str,
) -> Result<TokenResponse> {
    let response = http
        .post(&client.token_uri)
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("code_verifier", verifier),
            ("redirect_uri", redirect_uri),
            ("client_id", client.client_id.as_str()),
            ("client_secret", client.client_secret.expose().as_str()),
        ])
        .send()
        .await
        .map_err(|e| Error::Http(format!("token exchange request failed: {e}")))?;

    read_token_response(response, "token exchange").await
}

/// Refresh an access token using a refresh token.
///
/// A revoked or expired refresh token yields `Error::InvalidCredentials`.
pub async fn refresh_token(
    http: &reqwest::Client,
    client: &ClientSecret,
    refresh: &str,
) -> Result<TokenResponse> {
    let response = http
        .post(&client.token_uri)
        .form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh),
            ("client_id", client.client_id.as_str()),
            ("client_secret", client.client_secret.expose().as_str()),
        ])
        .send()
        .await
        .map_err(|e| Error::Http(format!("token refresh request failed: {e}")))?;

    read_token_response(response, "token refresh").await
}

async fn read_token_response(response: reqwest::Response, what: &str) -> Result<TokenResponse> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        let detail = match serde_json::from_str::<TokenError>(&body) {
            Ok(TokenError {
                error,
                error_description: Some(description),
            }) => format!("{error}: {description}"),
            Ok(TokenError { error, .. }) => error,
            Err(_) => body,
        };

        // invalid_grant: code or refresh token expired, revoked or already used
        if status.as_u16() == 401
            || status.as_u16() == 403
            || (status.as_u16() == 400 && detail.starts_with("invalid_grant"))
        {
            return Err(Error::InvalidCredentials(format!(
                "{what} rejected ({status}): {detail}"
            )));
        }

        return Err(Error::TokenExchange(format!(
            "{what} returned {status}: {detail}"
        )));
    }

    response
        .json::<TokenResponse>()
        .await
        .map_err(|e| Error::TokenExchange(format!("invalid {what} response: {e}")))
}
