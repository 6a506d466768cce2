//! Persistence of the session token
//!
//! Only the raw token is persisted; the user is derived from its claims on
//! rehydration.

use crate::core::error::SessionError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Storage key of the token, shared with the edge server cookie name
pub const AUTH_TOKEN_KEY: &str = "auth-token";

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self) -> Result<Option<String>, SessionError>;

    async fn save(&self, token: &str) -> Result<(), SessionError>;

    async fn clear(&self) -> Result<(), SessionError>;
}

/// Process-local store, useful for testing and short-lived tools
#[derive(Clone, Default)]
pub struct InMemorySessionStore {
    token: Arc<RwLock<Option<String>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store already holding `token`
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Arc::new(RwLock::new(Some(token.into()))),
        }
    }
}

fn lock_error(e: impl std::fmt::Display) -> SessionError {
    SessionError::Storage {
        message: format!("Failed to acquire lock: {}", e),
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self) -> Result<Option<String>, SessionError> {
        let token = self.token.read().map_err(lock_error)?;
        Ok(token.clone())
    }

    async fn save(&self, token: &str) -> Result<(), SessionError> {
        let mut slot = self.token.write().map_err(lock_error)?;
        *slot = Some(token.to_string());
        Ok(())
    }

    async fn clear(&self) -> Result<(), SessionError> {
        let mut slot = self.token.write().map_err(lock_error)?;
        *slot = None;
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredSession {
    #[serde(rename = "auth-token")]
    token: String,
}

/// JSON file store: `{ "auth-token": "<jwt>" }`
///
/// A missing file means no session. A file that does not parse is treated
/// the same way and logged.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn storage_error(path: &Path, e: impl std::fmt::Display) -> SessionError {
    SessionError::Storage {
        message: format!("{}: {}", path.display(), e),
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self) -> Result<Option<String>, SessionError> {
        let content = match tokio::fs::read(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(storage_error(&self.path, e)),
        };

        match serde_json::from_slice::<StoredSession>(&content) {
            Ok(stored) => Ok(Some(stored.token)),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "ignoring unreadable session file");
                Ok(None)
            }
        }
    }

    async fn save(&self, token: &str) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| storage_error(parent, e))?;
        }
        let body = serde_json::to_vec_pretty(&StoredSession {
            token: token.to_string(),
        })
        .map_err(|e| storage_error(&self.path, e))?;
        tokio::fs::write(&self.path, body)
            .await
            .map_err(|e| storage_error(&self.path, e))
    }

    async fn clear(&self) -> Result<(), SessionError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_error(&self.path, e)),
        }
    }
}
