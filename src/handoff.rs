//! State handoff between the login and callback processes
//!
//! The two processes never overlap: the OS starts the callback only after the
//! browser redirect, long after `login` has exited. A [`Mailbox`] is the single
//! slot they meet at. `put` overwrites whatever is there, `take` empties it, so
//! a record is consumed at most once and a replayed redirect finds nothing.

use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::Result;

/// File name of the pending handoff inside the state directory
pub const HANDOFF_FILE: &str = "handoff.json";

/// Everything the callback process needs to finish a login
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandoffRecord {
    pub client_id: String,
    pub verifier: String,
    pub token_endpoint: String,
    /// Portal base URL
    pub host: String,
    /// Provider discovery document URL, echoed back to the portal on login
    pub configuration: String,
}

impl std::fmt::Debug for HandoffRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandoffRecord")
            .field("client_id", &self.client_id)
            .field("verifier", &"<redacted>")
            .field("token_endpoint", &self.token_endpoint)
            .field("host", &self.host)
            .field("configuration", &self.configuration)
            .finish()
    }
}

/// Single-slot exclusive channel
pub trait Mailbox<T> {
    /// Store an item, replacing any previous one
    fn put(&self, item: &T) -> Result<()>;

    /// Remove and return the stored item
    ///
    /// Fails with [`Error::MissingState`] when the slot is empty.
    fn take(&self) -> Result<T>;
}

/// Mailbox backed by one JSON file
#[derive(Debug, Clone)]
pub struct FileMailbox<T> {
    path: PathBuf,
    _item: PhantomData<fn() -> T>,
}

impl<T> FileMailbox<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _item: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether something is waiting to be taken
    pub fn is_occupied(&self) -> bool {
        self.path.exists()
    }

    fn claim_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(format!(".claimed-{}", std::process::id()));
        self.path.with_file_name(name)
    }
}

impl<T: Serialize + DeserializeOwned> Mailbox<T> for FileMailbox<T> {
    fn put(&self, item: &T) -> Result<()> {
        let content = serde_json::to_string(item)
            .map_err(|e| Error::Storage(format!("Failed to encode handoff: {}", e)))?;
        write_private(&self.path, content.as_bytes())?;
        tracing::debug!("Stored handoff at {}", self.path.display());
        Ok(())
    }

    fn take(&self) -> Result<T> {
        // Renaming first makes the claim atomic: only one taker wins
        let claimed = self.claim_path();
        match std::fs::rename(&self.path, &claimed) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(Error::MissingState),
            Err(e) => {
                return Err(Error::Storage(format!(
                    "Failed to claim {}: {}",
                    self.path.display(),
                    e
                )))
            }
        }

        let content = std::fs::read_to_string(&claimed);
        if let Err(e) = std::fs::remove_file(&claimed) {
            tracing::warn!("Failed to remove {}: {}", claimed.display(), e);
        }
        let content = content
            .map_err(|e| Error::Storage(format!("Failed to read {}: {}", claimed.display(), e)))?;

        tracing::debug!("Consumed handoff from {}", self.path.display());
        serde_json::from_str(&content)
            .map_err(|e| Error::Storage(format!("Corrupt handoff {}: {}", self.path.display(), e)))
    }
}

/// Write a file readable only by the current user, creating parent dirs
pub(crate) fn write_private(path: &Path, content: &[u8]) -> Result<()> {
    let storage = |e: std::io::Error| Error::Storage(format!("Failed to write {}: {}", path.display(), e));

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(storage)?;
    }

    std::fs::write(path, content).map_err(storage)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(path, perms).map_err(storage)?;
    }

    Ok(())
}
