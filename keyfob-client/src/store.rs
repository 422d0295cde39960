//! Accepted-key store implementations.
//!
//! The engine only sees the [`AcceptedKeyStore`] trait; the caller decides
//! where accepted fingerprints live. [`FileKeyStore`] persists them as a
//! TOML file under the platform config directory and is the sensible default
//! for CLI applications; [`MemoryKeyStore`] holds them for the lifetime of
//! the process and doubles as the test store.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use keyfob_core::AcceptedKeyStore;

/// Errors that can occur opening a key store.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// The platform config directory could not be determined.
    #[error("could not determine config directory")]
    NoConfigDir,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct KeyFile {
    #[serde(default)]
    keys: Vec<String>,
}

/// Accepted fingerprints persisted to a TOML file.
///
/// Reads and writes are serialized through a lock so concurrent
/// verifications cannot interleave a read-modify-write. IO failures are
/// logged and degrade to an empty set; they never fail a handshake.
pub struct FileKeyStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileKeyStore {
    /// Open the default store for `app` under the platform config dir.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NoConfigDir` when the platform provides no
    /// config directory.
    pub fn open(app: &str) -> Result<Self, StoreError> {
        let dirs =
            directories::ProjectDirs::from("com", app, app).ok_or(StoreError::NoConfigDir)?;
        Ok(Self::at(dirs.config_dir().join("accepted-keys.toml")))
    }

    /// Open a store at an explicit path.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// The file backing this store.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Vec<String> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to read accepted-key store");
                return Vec::new();
            }
        };
        match toml::from_str::<KeyFile>(&content) {
            Ok(file) => file.keys,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to parse accepted-key store");
                Vec::new()
            }
        }
    }

    fn write(&self, keys: Vec<String>) {
        if let Some(parent) = self.path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!(path = %parent.display(), error = %e, "failed to create store directory");
                return;
            }
        }
        let file = KeyFile { keys };
        match toml::to_string_pretty(&file) {
            Ok(content) => {
                if let Err(e) = std::fs::write(&self.path, content) {
                    warn!(path = %self.path.display(), error = %e, "failed to write accepted-key store");
                }
            }
            Err(e) => {
                warn!(error = %e, "failed to serialize accepted-key store");
            }
        }
    }
}

impl AcceptedKeyStore for FileKeyStore {
    fn get(&self) -> Vec<String> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        self.read()
    }

    fn set(&self, keys: Vec<String>) {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        self.write(keys);
    }
}

/// Accepted fingerprints held in memory for the process lifetime.
#[derive(Debug, Default)]
pub struct MemoryKeyStore {
    keys: Mutex<Vec<String>>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a set of already-accepted fingerprints.
    pub fn with_keys(keys: Vec<String>) -> Self {
        Self {
            keys: Mutex::new(keys),
        }
    }
}

impl AcceptedKeyStore for MemoryKeyStore {
    fn get(&self) -> Vec<String> {
        self.keys.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn set(&self, keys: Vec<String>) {
        *self.keys.lock().unwrap_or_else(|e| e.into_inner()) = keys;
    }
}
