//! Authorization flow abstraction
//!
//! Decouples the broker from the OAuth protocol exchange. The production
//! implementation (`google_auth::InstalledAppFlow`) opens a redirect listener
//! on a fixed local port and waits for the user; test doubles answer
//! immediately without touching the network.

use crate::BoxFuture;
use crate::credential::Credential;
use crate::error::Result;
use crate::identity::{AuthSource, ScopeSet};

/// Mints and renews credentials.
///
/// - `start_interactive` runs the user-consent exchange bound to exactly
///   `scopes`. It blocks until consent completes or the flow's own timeout
///   fires. Failures are `Failure::InteractiveAuth`.
/// - `refresh` exchanges the credential's refresh token for a new credential
///   value. Failures are `Failure::Refresh`.
///
/// Neither operation retries internally; retry policy belongs to the caller.
pub trait AuthorizationFlow: Send + Sync {
    fn start_interactive<'a>(
        &'a self,
        source: &'a AuthSource,
        scopes: &'a ScopeSet,
    ) -> BoxFuture<'a, Result<Credential>>;

    fn refresh<'a>(
        &'a self,
        source: &'a AuthSource,
        credential: &'a Credential,
    ) -> BoxFuture<'a, Result<Credential>>;
}
