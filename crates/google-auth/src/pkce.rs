//! PKCE (Proof Key for Code Exchange) and the consent URL
//!
//! Generates the code verifier and S256 challenge per RFC 7636. The verifier
//! stays in memory for the duration of one interactive flow and is sent with
//! the code exchange; the challenge goes into the authorization URL.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use credential_broker::ScopeSet;
use rand::RngExt;
use sha2::{Digest, Sha256};
use url::Url;

use crate::client_secret::ClientSecret;
use crate::error::{Error, Result};

/// Generate a cryptographically random PKCE code verifier.
///
/// 64 random bytes encoded as URL-safe base64 without padding: 86
/// characters, inside the 43-128 range RFC 7636 allows.
pub fn generate_verifier() -> String {
    let mut bytes = [0u8; 64];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Compute the S256 code challenge from a verifier.
///
/// `challenge = BASE64URL(SHA256(verifier))`
pub fn compute_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Build the consent URL for an installed-app authorization.
///
/// Requests offline access with a forced consent prompt so Google issues a
/// refresh token even when the user has authorized this client before.
pub fn build_authorization_url(
    client: &ClientSecret,
    redirect_uri: &str,
    scopes: &ScopeSet,
    state: &str,
    challenge: &str,
) -> Result<String> {
    let url = Url::parse_with_params(
        &client.auth_uri,
        &[
            ("response_type", "code"),
            ("client_id", client.client_id.as_str()),
            ("redirect_uri", redirect_uri),
            ("scope", scopes.to_delimited().as_str()),
            ("state", state),
            ("code_challenge", challenge),
            ("code_challenge_method", "S256"),
            ("access_type", "offline"),
            ("prompt", "consent"),
        ],
    )
    .map_err(|e| Error::ClientSecret(format!("invalid auth_uri {}: {e}", client.auth_uri)))?;
    Ok(url.into())
}
