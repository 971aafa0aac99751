//! Google OAuth constants
//!
//! Endpoint defaults used when the client-secret file does not name its own,
//! and the fixed local port of the consent redirect listener.

use std::time::Duration;

/// Default authorization endpoint for installed applications
pub const AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";

/// Default token endpoint for code exchange and token refresh
pub const TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Local port the consent redirect lands on. Must match a redirect URI
/// registered for the OAuth client (`http://localhost:8002/`).
pub const CALLBACK_PORT: u16 = 8002;

/// How long the interactive flow waits for the browser redirect.
pub const CONSENT_TIMEOUT: Duration = Duration::from_secs(300);
