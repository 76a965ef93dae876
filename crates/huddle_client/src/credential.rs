//! Credential storage.
//!
//! The stored credential is the only signal of "authenticated". Stores are
//! injected into every component that reads or writes it, so tests can swap
//! the file-backed store for [`MemoryCredentialStore`].
//!
//! ## File layout
//!
//! [`FileCredentialStore`] keeps a flat JSON object of string keys to string
//! values. The credential lives under [`CREDENTIAL_KEY`]; other keys are
//! preserved untouched. Writes go to a temporary file that is synced and
//! renamed over the original.

use crate::error::{ClientError, ClientResult};
use huddle_protocol::authorization_value;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Key under which the credential is persisted.
pub const CREDENTIAL_KEY: &str = "authToken";

/// An opaque bearer token proving an authenticated session.
///
/// Any non-empty string is accepted. `Debug` output never shows the token.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Creates a credential, rejecting empty tokens.
    pub fn new(token: impl Into<String>) -> ClientResult<Self> {
        let token = token.into();
        if token.is_empty() {
            return Err(ClientError::Validation("credential must not be empty".into()));
        }
        Ok(Self(token))
    }

    /// Returns the raw token.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the `Authorization` header value for this credential.
    pub fn authorization_value(&self) -> String {
        authorization_value(&self.0)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Holder of the current session credential.
///
/// Written only by the login/register flow, by logout, and by the session
/// guard's invalidation transition. Read by every outbound request.
pub trait CredentialStore: Send + Sync {
    /// Returns the current credential, if any.
    fn get(&self) -> Option<Credential>;

    /// Replaces the current credential.
    fn set(&self, credential: Credential) -> ClientResult<()>;

    /// Removes the current credential. Clearing an empty store is a no-op.
    fn clear(&self) -> ClientResult<()>;

    /// Returns true if a credential is stored.
    fn is_authenticated(&self) -> bool {
        self.get().is_some()
    }
}

impl<S: CredentialStore + ?Sized> CredentialStore for Arc<S> {
    fn get(&self) -> Option<Credential> {
        (**self).get()
    }

    fn set(&self, credential: Credential) -> ClientResult<()> {
        (**self).set(credential)
    }

    fn clear(&self) -> ClientResult<()> {
        (**self).clear()
    }
}

/// A credential store that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    slot: RwLock<Option<Credential>>,
}

impl MemoryCredentialStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store already holding a credential.
    pub fn with_credential(credential: Credential) -> Self {
        Self {
            slot: RwLock::new(Some(credential)),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self) -> Option<Credential> {
        self.slot.read().clone()
    }

    fn set(&self, credential: Credential) -> ClientResult<()> {
        *self.slot.write() = Some(credential);
        Ok(())
    }

    fn clear(&self) -> ClientResult<()> {
        *self.slot.write() = None;
        Ok(())
    }
}

/// A credential store persisted to a key-value JSON file.
///
/// The file is read once at open; afterwards the in-memory copy is
/// authoritative and every write is persisted before returning.
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    entries: RwLock<BTreeMap<String, String>>,
}

impl FileCredentialStore {
    /// Opens the store at `path`, creating nothing until the first write.
    ///
    /// An unreadable or malformed file is logged and treated as empty; the
    /// next write replaces it.
    pub fn open(path: impl Into<PathBuf>) -> ClientResult<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let data = fs::read(&path)?;
            match serde_json::from_slice::<BTreeMap<String, String>>(&data) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Ignoring malformed credential file");
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    /// Returns the backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> ClientResult<()> {
        let data =
            serde_json::to_vec_pretty(entries).map_err(|e| ClientError::Storage(e.to_string()))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let temp_path = self.path.with_extension("tmp");
        let mut file = open_private(&temp_path)?;
        file.write_all(&data)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, &self.path)?;
        debug!(path = %self.path.display(), "Credential file written");
        Ok(())
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self) -> Option<Credential> {
        self.entries
            .read()
            .get(CREDENTIAL_KEY)
            .and_then(|token| Credential::new(token.clone()).ok())
    }

    fn set(&self, credential: Credential) -> ClientResult<()> {
        let mut entries = self.entries.write();
        let mut updated = entries.clone();
        updated.insert(CREDENTIAL_KEY.to_string(), credential.0);
        self.persist(&updated)?;
        *entries = updated;
        Ok(())
    }

    fn clear(&self) -> ClientResult<()> {
        let mut entries = self.entries.write();
        if !entries.contains_key(CREDENTIAL_KEY) {
            return Ok(());
        }
        let mut updated = entries.clone();
        updated.remove(CREDENTIAL_KEY);
        self.persist(&updated)?;
        *entries = updated;
        Ok(())
    }
}

#[cfg(unix)]
fn open_private(path: &Path) -> std::io::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> std::io::Result<File> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn empty_credential_is_rejected() {
        assert!(matches!(
            Credential::new(""),
            Err(ClientError::Validation(_))
        ));
        assert!(Credential::new(" ").is_ok());
    }

    #[test]
    fn debug_hides_token() {
        let credential = Credential::new("secret-token").unwrap();
        assert!(!format!("{credential:?}").contains("secret"));
        assert_eq!(credential.authorization_value(), "Token secret-token");
    }

    #[test]
    fn memory_store_lifecycle() {
        let store = MemoryCredentialStore::new();
        assert!(!store.is_authenticated());

        store.set(Credential::new("abc").unwrap()).unwrap();
        assert_eq!(store.get().unwrap().as_str(), "abc");

        store.set(Credential::new("def").unwrap()).unwrap();
        assert_eq!(store.get().unwrap().as_str(), "def");

        store.clear().unwrap();
        assert!(store.get().is_none());
        store.clear().unwrap();
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session").join("credentials.json");

        let store = FileCredentialStore::open(&path).unwrap();
        assert!(store.get().is_none());
        store.set(Credential::new("abc").unwrap()).unwrap();
        drop(store);

        let reopened = FileCredentialStore::open(&path).unwrap();
        assert_eq!(reopened.get().unwrap().as_str(), "abc");

        reopened.clear().unwrap();
        drop(reopened);

        let reopened = FileCredentialStore::open(&path).unwrap();
        assert!(reopened.get().is_none());
    }

    #[test]
    fn file_store_preserves_other_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, br#"{"theme": "dark"}"#).unwrap();

        let store = FileCredentialStore::open(&path).unwrap();
        store.set(Credential::new("abc").unwrap()).unwrap();
        store.clear().unwrap();

        let raw: BTreeMap<String, String> =
            serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw.get("theme").map(String::as_str), Some("dark"));
        assert!(!raw.contains_key(CREDENTIAL_KEY));
    }

    #[test]
    fn file_store_ignores_malformed_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, b"{not json").unwrap();

        let store = FileCredentialStore::open(&path).unwrap();
        assert!(store.get().is_none());

        store.set(Credential::new("abc").unwrap()).unwrap();
        let reopened = FileCredentialStore::open(&path).unwrap();
        assert_eq!(reopened.get().unwrap().as_str(), "abc");
    }

    #[test]
    fn file_store_ignores_empty_token() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, br#"{"authToken": ""}"#).unwrap();

        let store = FileCredentialStore::open(&path).unwrap();
        assert!(!store.is_authenticated());
    }
}
