//! Google OAuth authentication library
//!
//! Implements the installed-application consent flow and token refresh
//! against Google's OAuth endpoints, exposed to the credential broker as an
//! [`InstalledAppFlow`]. Has no dependency on the service binary and can be
//! tested on its own.
//!
//! Consent flow:
//! 1. `ClientSecret::load()` reads the downloaded client-secret JSON
//! 2. `CallbackServer::bind()` opens the loopback redirect listener
//! 3. `pkce::build_authorization_url()` builds the consent URL, which is
//!    opened in the user's browser
//! 4. `CallbackServer::wait_for_code()` captures the authorization code
//! 5. `token::exchange_code()` trades it for an access/refresh token pair
//!
//! Later expiries go through `token::refresh_token()` instead.

pub mod callback;
pub mod client_secret;
pub mod constants;
pub mod error;
pub mod flow;
pub mod pkce;
pub mod token;

pub use callback::{CallbackParams, CallbackServer, parse_callback};
pub use client_secret::ClientSecret;
pub use constants::*;
pub use error::{Error, Result};
pub use flow::{InstalledAppFlow, UrlOpener};
pub use pkce::{build_authorization_url, compute_challenge, generate_verifier};
pub use token::{TokenResponse, exchange_code, refresh_token};
