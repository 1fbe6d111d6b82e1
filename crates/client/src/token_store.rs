//! Durable token slot: two independent string entries (`token`,
//! `refreshToken`) that outlive the process.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TokenStoreError {
    #[error("token store I/O at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("token store at {path:?} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Storage for the access/refresh pair.
///
/// Shared between the session store and the transport; neither holds a
/// second copy of the tokens.
pub trait TokenStore: Send + Sync + core::fmt::Debug {
    fn access(&self) -> Result<Option<String>, TokenStoreError>;

    fn refresh(&self) -> Result<Option<String>, TokenStoreError>;

    /// Replace the access token, leaving the refresh token as is.
    fn set_access(&self, access: &str) -> Result<(), TokenStoreError>;

    fn set_pair(&self, access: &str, refresh: &str) -> Result<(), TokenStoreError>;

    /// Remove both entries.
    fn clear(&self) -> Result<(), TokenStoreError>;
}

/// On-disk layout, keyed like the browser storage it replaces.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct StoredTokens {
    #[serde(rename = "token", default, skip_serializing_if = "Option::is_none")]
    access: Option<String>,
    #[serde(rename = "refreshToken", default, skip_serializing_if = "Option::is_none")]
    refresh: Option<String>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ─────────────────────────────────────────────────────────────────────────────
// In-memory
// ─────────────────────────────────────────────────────────────────────────────

/// Process-local slot; forgotten on exit.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: Mutex<StoredTokens>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens(access: Option<&str>, refresh: Option<&str>) -> Self {
        Self {
            tokens: Mutex::new(StoredTokens {
                access: access.map(str::to_string),
                refresh: refresh.map(str::to_string),
            }),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn access(&self) -> Result<Option<String>, TokenStoreError> {
        Ok(lock(&self.tokens).access.clone())
    }

    fn refresh(&self) -> Result<Option<String>, TokenStoreError> {
        Ok(lock(&self.tokens).refresh.clone())
    }

    fn set_access(&self, access: &str) -> Result<(), TokenStoreError> {
        lock(&self.tokens).access = Some(access.to_string());
        Ok(())
    }

    fn set_pair(&self, access: &str, refresh: &str) -> Result<(), TokenStoreError> {
        *lock(&self.tokens) = StoredTokens {
            access: Some(access.to_string()),
            refresh: Some(refresh.to_string()),
        };
        Ok(())
    }

    fn clear(&self) -> Result<(), TokenStoreError> {
        *lock(&self.tokens) = StoredTokens::default();
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// File-backed
// ─────────────────────────────────────────────────────────────────────────────

/// JSON file slot. A missing file is an empty slot.
///
/// Writes go to a sibling temp file and are renamed into place, so a crash
/// never leaves half a token behind.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    io: Mutex<()>,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            io: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> TokenStoreError {
        TokenStoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn load(&self) -> Result<StoredTokens, TokenStoreError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(StoredTokens::default()),
            Err(e) => return Err(self.io_error(e)),
        };
        if raw.trim().is_empty() {
            return Ok(StoredTokens::default());
        }
        serde_json::from_str(&raw).map_err(|source| TokenStoreError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&self, tokens: &StoredTokens) -> Result<(), TokenStoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        let body = serde_json::to_vec_pretty(tokens).map_err(|source| TokenStoreError::Corrupt {
            path: self.path.clone(),
            source,
        })?;

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, body).map_err(|e| self.io_error(e))?;
        restrict_permissions(&tmp).map_err(|e| self.io_error(e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))
    }

    fn update(&self, f: impl FnOnce(&mut StoredTokens)) -> Result<(), TokenStoreError> {
        let _guard = lock(&self.io);
        let mut tokens = self.load()?;
        f(&mut tokens);
        self.save(&tokens)
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

impl TokenStore for FileTokenStore {
    fn access(&self) -> Result<Option<String>, TokenStoreError> {
        let _guard = lock(&self.io);
        Ok(self.load()?.access)
    }

    fn refresh(&self) -> Result<Option<String>, TokenStoreError> {
        let _guard = lock(&self.io);
        Ok(self.load()?.refresh)
    }

    fn set_access(&self, access: &str) -> Result<(), TokenStoreError> {
        self.update(|tokens| tokens.access = Some(access.to_string()))
    }

    fn set_pair(&self, access: &str, refresh: &str) -> Result<(), TokenStoreError> {
        self.update(|tokens| {
            tokens.access = Some(access.to_string());
            tokens.refresh = Some(refresh.to_string());
        })
    }

    fn clear(&self) -> Result<(), TokenStoreError> {
        let _guard = lock(&self.io);
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }
}
