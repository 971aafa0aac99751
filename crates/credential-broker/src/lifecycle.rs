//! Credential lifecycle state machine
//!
//! Pure functions, no I/O. [`classify`] sorts a credential into a
//! [`CredentialState`]; [`handle_event`] maps (state, event) to the next state
//! and the action the broker must execute. The broker performs the I/O for
//! each action and feeds the outcome back as the next event.
//!
//! ```text
//! NoCredential / ScopeMismatch / ExpiredNoRefresh ──► Mint
//! ExpiredWithRefresh ──► Refresh ──ok──► Persist
//!                              └─fail─► Mint
//! Mint ──ok──► Persist ──ok──► BuildClient
//!    └─fail──► Fail        └─fail─► Fail(StoreWrite)
//! Valid (cached) ──► BuildClient
//! ```
//!
//! Every credential that reaches `BuildClient` was classified `Valid` on the
//! way: cached, refreshed and minted credentials all pass through
//! [`classify`] before the broker acts on them.

use crate::credential::Credential;
use crate::error::Failure;
use crate::identity::ScopeSet;

/// Classification of a credential against the requested scopes at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialState {
    /// Nothing cached
    NoCredential,
    /// Cached credential lacks some requested scope; a refresh cannot widen it
    ScopeMismatch(Credential),
    /// Expired with no refresh token: permanently unusable
    ExpiredNoRefresh(Credential),
    /// Expired but renewable
    ExpiredWithRefresh(Credential),
    /// Usable as is
    Valid(Credential),
}

impl CredentialState {
    /// Label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            CredentialState::NoCredential => "no_credential",
            CredentialState::ScopeMismatch(_) => "scope_mismatch",
            CredentialState::ExpiredNoRefresh(_) => "expired_no_refresh",
            CredentialState::ExpiredWithRefresh(_) => "expired_with_refresh",
            CredentialState::Valid(_) => "valid",
        }
    }
}

/// Classify a credential for the requested scopes.
///
/// Scope coverage is checked before expiry: a credential granted the wrong
/// scopes is replaced even when its token is still live.
pub fn classify(
    credential: Option<Credential>,
    requested: &ScopeSet,
    now_millis: u64,
) -> CredentialState {
    match credential {
        None => CredentialState::NoCredential,
        Some(c) if !c.grants(requested) => CredentialState::ScopeMismatch(c),
        Some(c) if !c.is_expired_at(now_millis) => CredentialState::Valid(c),
        Some(c) if c.can_refresh() => CredentialState::ExpiredWithRefresh(c),
        Some(c) => CredentialState::ExpiredNoRefresh(c),
    }
}

/// How the credential handed to the factory was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionPath {
    Reuse,
    Refresh,
    Mint,
}

impl AcquisitionPath {
    pub fn label(&self) -> &'static str {
        match self {
            AcquisitionPath::Reuse => "reuse",
            AcquisitionPath::Refresh => "refresh",
            AcquisitionPath::Mint => "mint",
        }
    }
}

/// Broker progress within a single acquisition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lifecycle {
    /// Waiting for the token store
    Loading,
    /// Waiting for a refresh
    Refreshing,
    /// Waiting for interactive consent
    Minting,
    /// Waiting for the token store write
    Persisting { path: AcquisitionPath },
    /// Terminal: credential handed to the client factory
    Building { path: AcquisitionPath },
    /// Terminal: acquisition failed
    Failed,
}

/// Outcomes the broker reports back into the machine.
#[derive(Debug)]
pub enum LifecycleEvent {
    /// Cached credential classified (or `NoCredential` on miss/read failure)
    Loaded(CredentialState),
    /// Refresh returned a credential, classified
    Refreshed(CredentialState),
    RefreshFailed(Failure),
    /// Interactive flow returned a credential, classified
    Minted(CredentialState),
    MintFailed(Failure),
    Persisted(Credential),
    PersistFailed(Failure),
}

/// Work the broker must execute next.
#[derive(Debug, PartialEq, Eq)]
pub enum LifecycleAction {
    Refresh(Credential),
    Mint,
    Persist(Credential),
    BuildClient {
        credential: Credential,
        path: AcquisitionPath,
    },
    Fail(Failure),
}

/// Handle a state transition. Pure function: no I/O.
pub fn handle_event(state: Lifecycle, event: LifecycleEvent) -> (Lifecycle, LifecycleAction) {
    match (state, event) {
        // --- Loading ---
        (Lifecycle::Loading, LifecycleEvent::Loaded(CredentialState::Valid(credential))) => (
            Lifecycle::Building {
                path: AcquisitionPath::Reuse,
            },
            LifecycleAction::BuildClient {
                credential,
                path: AcquisitionPath::Reuse,
            },
        ),

        (
            Lifecycle::Loading,
            LifecycleEvent::Loaded(CredentialState::ExpiredWithRefresh(credential)),
        ) => (Lifecycle::Refreshing, LifecycleAction::Refresh(credential)),

        (Lifecycle::Loading, LifecycleEvent::Loaded(_)) => {
            (Lifecycle::Minting, LifecycleAction::Mint)
        }

        // --- Refreshing ---
        (Lifecycle::Refreshing, LifecycleEvent::Refreshed(CredentialState::Valid(credential))) => (
            Lifecycle::Persisting {
                path: AcquisitionPath::Refresh,
            },
            LifecycleAction::Persist(credential),
        ),

        // A refresh that still yields an unusable credential is treated
        // like a failed refresh.
        (Lifecycle::Refreshing, LifecycleEvent::Refreshed(_))
        | (Lifecycle::Refreshing, LifecycleEvent::RefreshFailed(_)) => {
            (Lifecycle::Minting, LifecycleAction::Mint)
        }

        // --- Minting ---
        (Lifecycle::Minting, LifecycleEvent::Minted(CredentialState::Valid(credential))) => (
            Lifecycle::Persisting {
                path: AcquisitionPath::Mint,
            },
            LifecycleAction::Persist(credential),
        ),

        (Lifecycle::Minting, LifecycleEvent::Minted(CredentialState::ScopeMismatch(_))) => (
            Lifecycle::Failed,
            LifecycleAction::Fail(Failure::InteractiveAuth(
                "consent did not grant every requested scope".into(),
            )),
        ),

        (Lifecycle::Minting, LifecycleEvent::Minted(other)) => (
            Lifecycle::Failed,
            LifecycleAction::Fail(Failure::InteractiveAuth(format!(
                "authorization flow returned an unusable credential ({})",
                other.label()
            ))),
        ),

        (Lifecycle::Minting, LifecycleEvent::MintFailed(failure)) => {
            (Lifecycle::Failed, LifecycleAction::Fail(failure))
        }

        // --- Persisting ---
        (Lifecycle::Persisting { path }, LifecycleEvent::Persisted(credential)) => (
            Lifecycle::Building { path },
            LifecycleAction::BuildClient { credential, path },
        ),

        (Lifecycle::Persisting { .. }, LifecycleEvent::PersistFailed(failure)) => {
            (Lifecycle::Failed, LifecycleAction::Fail(failure))
        }

        // --- Anything else is a broker defect ---
        (state, event) => (
            Lifecycle::Failed,
            LifecycleAction::Fail(Failure::Lifecycle(format!(
                "{state:?} cannot handle {event:?}"
            ))),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: u64 = 1_700_000_000_000;
    const DRIVE: &str = "https://www.googleapis.com/auth/drive";
    const GMAIL: &str = "https://www.googleapis.com/auth/gmail.readonly";

    fn scopes(list: &[&str]) -> ScopeSet {
        ScopeSet::new(list.iter().copied()).unwrap()
    }

    fn credential(expires: u64, refresh: Option<&str>, granted: &[&str]) -> Credential {
        Credential {
            access_token: "at".into(),
            refresh_token: refresh.map(String::from),
            expires,
            scopes: scopes(granted),
        }
    }

    fn live() -> Credential {
        credential(NOW + 3_600_000, Some("rt"), &[DRIVE])
    }

    // --- classify ---

    #[test]
    fn classify_missing_credential() {
        assert_eq!(
            classify(None, &scopes(&[DRIVE]), NOW),
            CredentialState::NoCredential
        );
    }

    #[test]
    fn classify_live_credential_is_valid() {
        assert_eq!(
            classify(Some(live()), &scopes(&[DRIVE]), NOW),
            CredentialState::Valid(live())
        );
    }

    #[test]
    fn classify_expired_by_refresh_token_presence() {
        let with = credential(NOW - 1, Some("rt"), &[DRIVE]);
        let without = credential(NOW - 1, None, &[DRIVE]);
        assert_eq!(
            classify(Some(with.clone()), &scopes(&[DRIVE]), NOW),
            CredentialState::ExpiredWithRefresh(with)
        );
        assert_eq!(
            classify(Some(without.clone()), &scopes(&[DRIVE]), NOW),
            CredentialState::ExpiredNoRefresh(without)
        );
    }

    #[test]
    fn classify_scope_mismatch_wins_over_validity() {
        let state = classify(Some(live()), &scopes(&[DRIVE, GMAIL]), NOW);
        assert_eq!(state.label(), "scope_mismatch");
    }

    #[test]
    fn classify_narrower_request_reuses_wider_grant() {
        let wide = credential(NOW + 3_600_000, None, &[DRIVE, GMAIL]);
        assert_eq!(
            classify(Some(wide), &scopes(&[GMAIL]), NOW).label(),
            "valid"
        );
    }

    // --- Loading ---

    #[test]
    fn loaded_valid_builds_without_persisting() {
        let (state, action) = handle_event(
            Lifecycle::Loading,
            LifecycleEvent::Loaded(CredentialState::Valid(live())),
        );
        assert_eq!(
            state,
            Lifecycle::Building {
                path: AcquisitionPath::Reuse
            }
        );
        assert_eq!(
            action,
            LifecycleAction::BuildClient {
                credential: live(),
                path: AcquisitionPath::Reuse
            }
        );
    }

    #[test]
    fn loaded_expired_with_refresh_refreshes() {
        let expired = credential(NOW - 1, Some("rt"), &[DRIVE]);
        let (state, action) = handle_event(
            Lifecycle::Loading,
            LifecycleEvent::Loaded(CredentialState::ExpiredWithRefresh(expired.clone())),
        );
        assert_eq!(state, Lifecycle::Refreshing);
        assert_eq!(action, LifecycleAction::Refresh(expired));
    }

    #[test]
    fn loaded_unusable_states_mint() {
        let cases = [
            CredentialState::NoCredential,
            CredentialState::ExpiredNoRefresh(credential(NOW - 1, None, &[DRIVE])),
            CredentialState::ScopeMismatch(live()),
        ];
        for case in cases {
            let label = case.label();
            let (state, action) = handle_event(Lifecycle::Loading, LifecycleEvent::Loaded(case));
            assert_eq!(state, Lifecycle::Minting, "{label}");
            assert_eq!(action, LifecycleAction::Mint, "{label}");
        }
    }

    // --- Refreshing ---

    #[test]
    fn refreshed_valid_persists() {
        let (state, action) = handle_event(
            Lifecycle::Refreshing,
            LifecycleEvent::Refreshed(CredentialState::Valid(live())),
        );
        assert_eq!(
            state,
            Lifecycle::Persisting {
                path: AcquisitionPath::Refresh
            }
        );
        assert_eq!(action, LifecycleAction::Persist(live()));
    }

    #[test]
    fn refresh_failure_falls_through_to_mint() {
        let (state, action) = handle_event(
            Lifecycle::Refreshing,
            LifecycleEvent::RefreshFailed(Failure::Refresh("invalid_grant".into())),
        );
        assert_eq!(state, Lifecycle::Minting);
        assert_eq!(action, LifecycleAction::Mint);
    }

    #[test]
    fn refresh_returning_expired_credential_mints() {
        let still_expired = credential(NOW - 1, Some("rt"), &[DRIVE]);
        let (state, action) = handle_event(
            Lifecycle::Refreshing,
            LifecycleEvent::Refreshed(CredentialState::ExpiredWithRefresh(still_expired)),
        );
        assert_eq!(state, Lifecycle::Minting);
        assert_eq!(action, LifecycleAction::Mint);
    }

    // --- Minting ---

    #[test]
    fn minted_valid_persists() {
        let (state, action) = handle_event(
            Lifecycle::Minting,
            LifecycleEvent::Minted(CredentialState::Valid(live())),
        );
        assert_eq!(
            state,
            Lifecycle::Persisting {
                path: AcquisitionPath::Mint
            }
        );
        assert_eq!(action, LifecycleAction::Persist(live()));
    }

    #[test]
    fn mint_failure_is_returned_unchanged() {
        let failure = Failure::InteractiveAuth("timed out waiting for consent".into());
        let (state, action) = handle_event(
            Lifecycle::Minting,
            LifecycleEvent::MintFailed(failure.clone()),
        );
        assert_eq!(state, Lifecycle::Failed);
        assert_eq!(action, LifecycleAction::Fail(failure));
    }

    #[test]
    fn minted_with_missing_scopes_fails() {
        let (state, action) = handle_event(
            Lifecycle::Minting,
            LifecycleEvent::Minted(CredentialState::ScopeMismatch(live())),
        );
        assert_eq!(state, Lifecycle::Failed);
        match action {
            LifecycleAction::Fail(Failure::InteractiveAuth(cause)) => {
                assert!(cause.contains("scope"), "got: {cause}")
            }
            other => panic!("expected InteractiveAuth failure, got {other:?}"),
        }
    }

    #[test]
    fn minted_expired_credential_fails() {
        let (_, action) = handle_event(
            Lifecycle::Minting,
            LifecycleEvent::Minted(CredentialState::ExpiredNoRefresh(credential(
                NOW - 1,
                None,
                &[DRIVE],
            ))),
        );
        assert!(matches!(
            action,
            LifecycleAction::Fail(Failure::InteractiveAuth(_))
        ));
    }

    // --- Persisting ---

    #[test]
    fn persisted_builds_with_original_path() {
        let (state, action) = handle_event(
            Lifecycle::Persisting {
                path: AcquisitionPath::Refresh,
            },
            LifecycleEvent::Persisted(live()),
        );
        assert_eq!(
            state,
            Lifecycle::Building {
                path: AcquisitionPath::Refresh
            }
        );
        assert_eq!(
            action,
            LifecycleAction::BuildClient {
                credential: live(),
                path: AcquisitionPath::Refresh
            }
        );
    }

    #[test]
    fn persist_failure_is_fatal() {
        let failure = Failure::StoreWrite("disk full".into());
        let (state, action) = handle_event(
            Lifecycle::Persisting {
                path: AcquisitionPath::Mint,
            },
            LifecycleEvent::PersistFailed(failure.clone()),
        );
        assert_eq!(state, Lifecycle::Failed);
        assert_eq!(action, LifecycleAction::Fail(failure));
    }

    // --- Invalid transitions ---

    #[test]
    fn unexpected_event_fails_instead_of_panicking() {
        let (state, action) = handle_event(
            Lifecycle::Loading,
            LifecycleEvent::Persisted(live()),
        );
        assert_eq!(state, Lifecycle::Failed);
        assert!(matches!(action, LifecycleAction::Fail(Failure::Lifecycle(_))));

        let (state, _) = handle_event(
            Lifecycle::Failed,
            LifecycleEvent::Loaded(CredentialState::Valid(live())),
        );
        assert_eq!(state, Lifecycle::Failed);
    }
}
