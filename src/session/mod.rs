use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Credentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl Credentials {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: Some(access_token.into()),
            refresh_token: Some(refresh_token.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none()
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to read credentials: {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse credentials: {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write credentials: {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("credential store lock poisoned")]
    Poisoned,
}

/// Where the credential pair lives between runs.
pub trait CredentialStore: Send + Sync {
    fn load(&self) -> Result<Credentials, SessionError>;
    fn save(&self, credentials: &Credentials) -> Result<(), SessionError>;
    fn clear(&self) -> Result<(), SessionError>;
}

#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    inner: Mutex<Credentials>,
}

impl MemoryCredentialStore {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            inner: Mutex::new(credentials),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Result<Credentials, SessionError> {
        self.inner
            .lock()
            .map(|c| c.clone())
            .map_err(|_| SessionError::Poisoned)
    }

    fn save(&self, credentials: &Credentials) -> Result<(), SessionError> {
        let mut guard = self.inner.lock().map_err(|_| SessionError::Poisoned)?;
        *guard = credentials.clone();
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionError> {
        self.save(&Credentials::default())
    }
}

/// JSON file holding `access_token` / `refresh_token`. A missing file reads
/// as an empty pair; clearing removes the file.
#[derive(Clone, Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn display(&self) -> String {
        self.path.display().to_string()
    }
}

// Owner-only on unix, including files that already existed with a wider mode.
fn write_private(path: &Path, body: &[u8]) -> std::io::Result<()> {
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }
    file.write_all(body)?;
    file.flush()
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Credentials, SessionError> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) if contents.trim().is_empty() => Ok(Credentials::default()),
            Ok(contents) => serde_json::from_str(&contents).map_err(|e| SessionError::Parse {
                path: self.display(),
                source: e,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Credentials::default()),
            Err(e) => Err(SessionError::Read {
                path: self.display(),
                source: e,
            }),
        }
    }

    fn save(&self, credentials: &Credentials) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| SessionError::Write {
                    path: parent.display().to_string(),
                    source: e,
                })?;
            }
        }
        let body = serde_json::to_vec_pretty(credentials).map_err(|e| SessionError::Parse {
            path: self.display(),
            source: e,
        })?;
        write_private(&self.path, &body).map_err(|e| SessionError::Write {
            path: self.display(),
            source: e,
        })
    }

    fn clear(&self) -> Result<(), SessionError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SessionError::Write {
                path: self.display(),
                source: e,
            }),
        }
    }
}

/// Process-wide credential pair.
///
/// Transitions are `login` (both tokens set), `rotate` (access token
/// replaced, refresh token optionally replaced), and `invalidate` (both
/// cleared). `login` and `rotate` are written through to the backing store
/// before they become visible to readers. `invalidate` clears the in-memory
/// pair first, so a store that fails to clear never leaves the old tokens
/// current.
pub struct Session {
    store: Box<dyn CredentialStore>,
    current: Mutex<Credentials>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let current = self.snapshot().unwrap_or_default();
        f.debug_struct("Session")
            .field("has_access_token", &current.access_token.is_some())
            .field("has_refresh_token", &current.refresh_token.is_some())
            .finish()
    }
}

impl Session {
    /// Opens a session over whatever the store currently holds.
    pub fn open(store: Box<dyn CredentialStore>) -> Result<Self, SessionError> {
        let current = store.load()?;
        Ok(Self {
            store,
            current: Mutex::new(current),
        })
    }

    pub fn in_memory(credentials: Credentials) -> Self {
        Self {
            store: Box::new(MemoryCredentialStore::new(credentials.clone())),
            current: Mutex::new(credentials),
        }
    }

    pub fn snapshot(&self) -> Result<Credentials, SessionError> {
        self.current
            .lock()
            .map(|c| c.clone())
            .map_err(|_| SessionError::Poisoned)
    }

    pub fn access_token(&self) -> Option<String> {
        self.snapshot().ok().and_then(|c| c.access_token)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.snapshot().ok().and_then(|c| c.refresh_token)
    }

    pub fn login(
        &self,
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Result<(), SessionError> {
        self.replace(Credentials::new(access_token, refresh_token))
    }

    pub fn rotate(
        &self,
        access_token: impl Into<String>,
        refresh_token: Option<String>,
    ) -> Result<(), SessionError> {
        let mut next = self.snapshot()?;
        next.access_token = Some(access_token.into());
        if let Some(refresh) = refresh_token {
            next.refresh_token = Some(refresh);
        }
        self.replace(next)
    }

    pub fn invalidate(&self) -> Result<(), SessionError> {
        let mut guard = self.current.lock().map_err(|_| SessionError::Poisoned)?;
        *guard = Credentials::default();
        self.store.clear()
    }

    fn replace(&self, next: Credentials) -> Result<(), SessionError> {
        let mut guard = self.current.lock().map_err(|_| SessionError::Poisoned)?;
        self.store.save(&next)?;
        *guard = next;
        Ok(())
    }
}
