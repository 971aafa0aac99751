//! API client factory abstraction

use crate::BoxFuture;
use crate::credential::Credential;
use crate::error::Result;
use crate::identity::ServiceIdentity;

/// Turns a valid credential into a client handle for a service identity.
///
/// Construction is single-shot: failures (unknown service or version,
/// unreachable network) are reported as `Failure::Factory` and never retried
/// by the broker. The broker never inspects the handle.
pub trait ClientFactory: Send + Sync {
    type Handle: Send;

    fn build<'a>(
        &'a self,
        identity: &'a ServiceIdentity,
        credential: &'a Credential,
    ) -> BoxFuture<'a, Result<Self::Handle>>;
}
