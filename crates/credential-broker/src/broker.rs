//! Credential broker: one lifecycle pass per `acquire_client` call
//!
//! Drives the pure state machine in [`crate::lifecycle`], executing the I/O
//! for each action against the injected collaborators. The broker owns the
//! in-memory credential for the duration of one call; the token store owns
//! the durable copy.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::credential::{Credential, now_millis};
use crate::error::{Failure, Result};
use crate::factory::ClientFactory;
use crate::flow::AuthorizationFlow;
use crate::identity::{AuthSource, ServiceIdentity};
use crate::lifecycle::{Lifecycle, LifecycleAction, LifecycleEvent, classify, handle_event};
use crate::metrics::record_acquisition;
use crate::store::TokenStore;

/// Produces client handles, reusing, refreshing or minting credentials as needed.
///
/// Each call runs to completion before returning and performs no internal
/// retries. Run at most one broker per token-store key at a time: the store
/// is not locked.
pub struct CredentialBroker<F: ClientFactory> {
    store: Arc<dyn TokenStore>,
    flow: Arc<dyn AuthorizationFlow>,
    factory: F,
}

impl<F: ClientFactory> CredentialBroker<F> {
    pub fn new(store: Arc<dyn TokenStore>, flow: Arc<dyn AuthorizationFlow>, factory: F) -> Self {
        Self {
            store,
            flow,
            factory,
        }
    }

    /// Produce a client handle for `identity`, doing the least work possible.
    ///
    /// Reuse beats refresh beats interactive mint. A refreshed or minted
    /// credential is persisted before the factory runs, so a factory failure
    /// still leaves a reusable credential behind for the next call.
    pub async fn acquire_client(
        &self,
        identity: &ServiceIdentity,
        source: &AuthSource,
    ) -> Result<F::Handle> {
        let scopes = identity.scopes();
        let cached = self.load(identity).await;
        let loaded = classify(cached, scopes, now_millis());
        debug!(
            service = identity.name(),
            version = identity.version(),
            state = loaded.label(),
            "classified cached credential"
        );

        let (mut state, mut action) =
            handle_event(Lifecycle::Loading, LifecycleEvent::Loaded(loaded));

        loop {
            let event = match action {
                LifecycleAction::Refresh(expired) => {
                    info!(
                        service = identity.name(),
                        version = identity.version(),
                        "credential expired, refreshing"
                    );
                    match self.flow.refresh(source, &expired).await {
                        Ok(renewed) => LifecycleEvent::Refreshed(classify(
                            Some(renewed),
                            scopes,
                            now_millis(),
                        )),
                        Err(e) => {
                            warn!(
                                service = identity.name(),
                                version = identity.version(),
                                error = %e,
                                "refresh failed, falling back to interactive authorization"
                            );
                            LifecycleEvent::RefreshFailed(e)
                        }
                    }
                }
                LifecycleAction::Mint => {
                    info!(
                        service = identity.name(),
                        version = identity.version(),
                        scopes = %scopes,
                        "starting interactive authorization"
                    );
                    match self.flow.start_interactive(source, scopes).await {
                        Ok(minted) => {
                            LifecycleEvent::Minted(classify(Some(minted), scopes, now_millis()))
                        }
                        Err(e) => LifecycleEvent::MintFailed(e),
                    }
                }
                LifecycleAction::Persist(credential) => {
                    match self.store.save(identity, &credential).await {
                        Ok(()) => LifecycleEvent::Persisted(credential),
                        Err(e) => LifecycleEvent::PersistFailed(e),
                    }
                }
                LifecycleAction::BuildClient { credential, path } => {
                    debug!(?state, "lifecycle complete");
                    return match self.factory.build(identity, &credential).await {
                        Ok(handle) => {
                            record_acquisition(path.label());
                            info!(
                                service = identity.name(),
                                version = identity.version(),
                                path = path.label(),
                                "client ready"
                            );
                            Ok(handle)
                        }
                        Err(e) => Err(self.fail(identity, e)),
                    };
                }
                LifecycleAction::Fail(failure) => return Err(self.fail(identity, failure)),
            };

            (state, action) = handle_event(state, event);
        }
    }

    /// Load the cached credential. Read failures are logged and become a miss.
    async fn load(&self, identity: &ServiceIdentity) -> Option<Credential> {
        match self.store.load(identity).await {
            Ok(cached) => cached,
            Err(e) => {
                warn!(
                    service = identity.name(),
                    version = identity.version(),
                    error = %e,
                    "ignoring unreadable cached credential"
                );
                None
            }
        }
    }

    fn fail(&self, identity: &ServiceIdentity, failure: Failure) -> Failure {
        record_acquisition("failed");
        warn!(
            service = identity.name(),
            version = identity.version(),
            kind = %failure.kind(),
            cause = failure.cause(),
            "credential acquisition failed"
        );
        failure
    }
}

impl<F: ClientFactory> std::fmt::Debug for CredentialBroker<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialBroker").finish_non_exhaustive()
    }
}
