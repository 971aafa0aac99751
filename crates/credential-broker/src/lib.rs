//! OAuth2 credential lifecycle broker
//!
//! Produces a ready-to-use API client handle for a service identity while
//! doing the least work possible: reuse a cached credential, else refresh it,
//! else run a fresh interactive authorization. The broker owns no I/O of its
//! own; it drives three injected collaborators:
//!
//! - [`TokenStore`] persists one credential per (service, version)
//! - [`AuthorizationFlow`] mints (interactive consent) and refreshes credentials
//! - [`ClientFactory`] turns a valid credential into a client handle
//!
//! Acquisition flow:
//! 1. Load the cached credential (`TokenStore::load`), read failures are a miss
//! 2. Classify it with `lifecycle::classify`
//! 3. Refresh or mint as `lifecycle::handle_event` directs
//! 4. Persist the repaired credential (`TokenStore::save`)
//! 5. Build the client (`ClientFactory::build`)

pub mod broker;
pub mod credential;
pub mod error;
pub mod factory;
pub mod flow;
pub mod identity;
pub mod lifecycle;
mod metrics;
pub mod store;

use std::future::Future;
use std::pin::Pin;

pub use broker::CredentialBroker;
pub use credential::{Credential, EXPIRY_SKEW_MILLIS, now_millis};
pub use error::{Failure, FailureKind, Result};
pub use factory::ClientFactory;
pub use flow::AuthorizationFlow;
pub use identity::{AuthSource, IdentityError, ScopeSet, ServiceIdentity};
pub use lifecycle::{CredentialState, classify};
pub use store::{FileTokenStore, TokenStore};

/// Boxed future returned by collaborator trait methods.
///
/// Collaborators are held as trait objects, so their async methods return
/// `Pin<Box<dyn Future>>` rather than `impl Future`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
