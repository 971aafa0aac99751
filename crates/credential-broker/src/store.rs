//! Token store: durable cache of one credential per (service, version)
//!
//! [`FileTokenStore`] keeps each credential in its own JSON file named
//! `token_{service}_{version}.json`. Writes go to a temp file in the same
//! directory and are renamed over the target, so a crash mid-write leaves
//! either the old file or the new one, never a torn file.
//!
//! The store is not locked. Two brokers writing the same key race on
//! read-modify-write; callers run at most one broker per key at a time.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::BoxFuture;
use crate::credential::Credential;
use crate::error::{Failure, Result};
use crate::identity::ServiceIdentity;

/// Payload format written by this version of the store.
const STORE_FORMAT: u32 = 1;

/// Keyed credential persistence.
///
/// `load` returns `Ok(None)` when nothing is cached for the key. Unreadable or
/// corrupt entries are `Failure::StoreRead`; write problems are
/// `Failure::StoreWrite`.
pub trait TokenStore: Send + Sync {
    fn load<'a>(
        &'a self,
        identity: &'a ServiceIdentity,
    ) -> BoxFuture<'a, Result<Option<Credential>>>;

    fn save<'a>(
        &'a self,
        identity: &'a ServiceIdentity,
        credential: &'a Credential,
    ) -> BoxFuture<'a, Result<()>>;
}

/// On-disk payload. Private cache format, not meant for hand editing.
#[derive(Debug, Serialize, Deserialize)]
struct StoredCredential {
    format: u32,
    service: String,
    version: String,
    credential: Credential,
}

/// Directory of per-key credential files.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    dir: PathBuf,
}

impl FileTokenStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Deterministic file path for a (service, version) key.
    pub fn path_for(&self, identity: &ServiceIdentity) -> PathBuf {
        self.dir.join(format!(
            "token_{}_{}.json",
            identity.name(),
            identity.version()
        ))
    }

    async fn read(&self, identity: &ServiceIdentity) -> Result<Option<Credential>> {
        let path = self.path_for(identity);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no cached credential");
                return Ok(None);
            }
            Err(e) => {
                return Err(Failure::StoreRead(format!(
                    "reading {}: {e}",
                    path.display()
                )));
            }
        };

        let stored: StoredCredential = serde_json::from_str(&contents).map_err(|e| {
            Failure::StoreRead(format!("parsing {}: {e}", path.display()))
        })?;

        if stored.format != STORE_FORMAT {
            return Err(Failure::StoreRead(format!(
                "{} has unsupported format {}",
                path.display(),
                stored.format
            )));
        }
        if stored.service != identity.name() || stored.version != identity.version() {
            return Err(Failure::StoreRead(format!(
                "{} holds a credential for {}/{}",
                path.display(),
                stored.service,
                stored.version
            )));
        }

        debug!(path = %path.display(), "loaded cached credential");
        Ok(Some(stored.credential))
    }

    async fn write(&self, identity: &ServiceIdentity, credential: &Credential) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            Failure::StoreWrite(format!("creating {}: {e}", self.dir.display()))
        })?;

        let stored = StoredCredential {
            format: STORE_FORMAT,
            service: identity.name().to_owned(),
            version: identity.version().to_owned(),
            credential: credential.clone(),
        };
        write_atomic(&self.path_for(identity), &stored).await
    }
}

impl TokenStore for FileTokenStore {
    fn load<'a>(
        &'a self,
        identity: &'a ServiceIdentity,
    ) -> BoxFuture<'a, Result<Option<Credential>>> {
        Box::pin(self.read(identity))
    }

    fn save<'a>(
        &'a self,
        identity: &'a ServiceIdentity,
        credential: &'a Credential,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.write(identity, credential))
    }
}

/// Write a credential file atomically.
///
/// Writes to a temporary file in the same directory, flushes it to disk,
/// then renames it over the target. On unix the temp file is created 0600
/// (owner read/write only) since it contains OAuth tokens, and the directory
/// is synced after the rename so the new entry survives a power loss.
async fn write_atomic(path: &Path, data: &StoredCredential) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| Failure::StoreWrite(format!("serializing credential: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Failure::StoreWrite("token path has no parent directory".into()))?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Failure::StoreWrite("token path has no file name".into()))?;

    let tmp_path = dir.join(format!(".{file_name}.tmp.{}", std::process::id()));

    // Leftover from an interrupted write by a process with the same pid
    let _ = tokio::fs::remove_file(&tmp_path).await;

    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);
    let mut file = options
        .open(&tmp_path)
        .await
        .map_err(|e| Failure::StoreWrite(format!("creating temp token file: {e}")))?;

    let written = async {
        file.write_all(json.as_bytes()).await?;
        file.sync_all().await
    }
    .await;
    drop(file);
    if let Err(e) = written {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(Failure::StoreWrite(format!("writing temp token file: {e}")));
    }

    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(Failure::StoreWrite(format!("renaming temp token file: {e}")));
    }

    #[cfg(unix)]
    sync_dir(dir).await?;

    debug!(path = %path.display(), "persisted credential");
    Ok(())
}

/// Flush a directory entry change (the rename) to disk.
#[cfg(unix)]
async fn sync_dir(dir: &Path) -> Result<()> {
    let handle = tokio::fs::File::open(dir)
        .await
        .map_err(|e| Failure::StoreWrite(format!("opening {}: {e}", dir.display())))?;
    handle
        .sync_all()
        .await
        .map_err(|e| Failure::StoreWrite(format!("syncing {}: {e}", dir.display())))
}
