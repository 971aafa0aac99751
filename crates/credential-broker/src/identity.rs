//! Service identity, scope sets and the client-secret source
//!
//! These are caller-supplied, immutable inputs. Malformed input is rejected
//! at construction with [`IdentityError`]; once built, a `ServiceIdentity`
//! always names a path-safe store key and a non-empty scope set.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Contract violation in caller-supplied identity data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("scope set must contain at least one scope")]
    EmptyScopes,

    #[error("scope must not be blank")]
    BlankScope,

    #[error("scope {0:?} contains whitespace")]
    ScopeWhitespace(String),

    #[error("invalid {field} {value:?}: expected non-empty [A-Za-z0-9._-]")]
    InvalidComponent { field: &'static str, value: String },
}

/// Non-empty, ordered set of OAuth scope strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "BTreeSet<String>", into = "BTreeSet<String>")]
pub struct ScopeSet(BTreeSet<String>);

impl ScopeSet {
    /// Build a scope set from any iterator of scope strings.
    ///
    /// Surrounding whitespace is trimmed and duplicates collapse.
    pub fn new<I, S>(scopes: I) -> Result<Self, IdentityError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = BTreeSet::new();
        for scope in scopes {
            let scope = scope.as_ref().trim();
            if scope.is_empty() {
                return Err(IdentityError::BlankScope);
            }
            // Scopes travel space-delimited, so one token can never hold a space
            if scope.chars().any(char::is_whitespace) {
                return Err(IdentityError::ScopeWhitespace(scope.to_owned()));
            }
            set.insert(scope.to_owned());
        }
        if set.is_empty() {
            return Err(IdentityError::EmptyScopes);
        }
        Ok(Self(set))
    }

    /// Parse the space-delimited `scope` field of a token response.
    pub fn parse(delimited: &str) -> Result<Self, IdentityError> {
        Self::new(delimited.split_whitespace())
    }

    /// Whether every scope in `requested` is part of this set.
    pub fn covers(&self, requested: &ScopeSet) -> bool {
        requested.0.is_subset(&self.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false: construction rejects empty sets.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Space-joined form used in authorization URLs.
    pub fn to_delimited(&self) -> String {
        self.iter().collect::<Vec<_>>().join(" ")
    }
}

impl TryFrom<BTreeSet<String>> for ScopeSet {
    type Error = IdentityError;

    fn try_from(value: BTreeSet<String>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ScopeSet> for BTreeSet<String> {
    fn from(value: ScopeSet) -> Self {
        value.0
    }
}

impl fmt::Display for ScopeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_delimited())
    }
}

/// What access is being requested: (service name, API version, scopes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceIdentity {
    name: String,
    version: String,
    scopes: ScopeSet,
}

impl ServiceIdentity {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        scopes: ScopeSet,
    ) -> Result<Self, IdentityError> {
        let name = validate_component("service name", name.into())?;
        let version = validate_component("version", version.into())?;
        Ok(Self {
            name,
            version,
            scopes,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn scopes(&self) -> &ScopeSet {
        &self.scopes
    }
}

impl fmt::Display for ServiceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.version)
    }
}

// Name and version end up in a file name.
fn validate_component(field: &'static str, value: String) -> Result<String, IdentityError> {
    let ok = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        && value != "."
        && value != "..";
    if ok {
        Ok(value)
    } else {
        Err(IdentityError::InvalidComponent { field, value })
    }
}

/// Location of the OAuth client-secret material used to start a flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSource {
    client_secret_file: PathBuf,
}

impl AuthSource {
    pub fn new(client_secret_file: impl Into<PathBuf>) -> Self {
        Self {
            client_secret_file: client_secret_file.into(),
        }
    }

    pub fn client_secret_file(&self) -> &Path {
        &self.client_secret_file
    }
}
