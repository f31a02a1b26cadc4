//! # Session Store
//!
//! Directory temporanea di output per ogni sessione interattiva.
//!
//! ## Responsabilità:
//! - Registra una sessione con la sua temp root (`<prima root>/<temp_root_name>`)
//!   ed eventualmente un riferimento opaco della vista
//! - Crea la directory della sessione in modo lazy, una sola volta, prima del primo batch
//! - Distrugge la directory ricorsivamente alla chiusura della sessione
//!
//! ## Garanzie:
//! - Due sessioni non condividono mai la stessa directory (id UUID v4)
//! - `destroy` è idempotente: directory già rimossa o sessione sconosciuta
//!   vengono solo loggate, mai propagate al chiamante

use crate::error::CompressError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Identity of one interactive session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

#[derive(Debug)]
struct SessionEntry {
    temp_root: PathBuf,
    dir: Option<PathBuf>,
    view_ref: Option<String>,
}

#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<SessionId, SessionEntry>>,
    views: Mutex<HashMap<String, SessionId>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `session` so that its store will live under `temp_root`
    pub async fn register(&self, session: SessionId, temp_root: impl Into<PathBuf>, view_ref: Option<String>) {
        let temp_root = temp_root.into();
        debug!("Registering session {} under {}", session, temp_root.display());
        if let Some(view) = &view_ref {
            self.views.lock().await.insert(view.clone(), session);
        }
        self.sessions.lock().await.insert(
            session,
            SessionEntry {
                temp_root,
                dir: None,
                view_ref,
            },
        );
    }

    /// Session registered for an opaque view reference
    pub async fn session_for_view(&self, view_ref: &str) -> Option<SessionId> {
        self.views.lock().await.get(view_ref).copied()
    }

    /// Store directory of `session`, if already created
    pub async fn dir(&self, session: SessionId) -> Option<PathBuf> {
        self.sessions.lock().await.get(&session).and_then(|e| e.dir.clone())
    }

    /// Create the store directory on first use and return it
    pub async fn create(&self, session: SessionId) -> Result<PathBuf, CompressError> {
        let mut sessions = self.sessions.lock().await;
        let entry = sessions
            .get_mut(&session)
            .ok_or_else(|| CompressError::unknown(format!("session {} is not open", session)))?;

        if let Some(dir) = &entry.dir {
            return Ok(dir.clone());
        }

        let dir = entry.temp_root.join(session.to_string());
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| CompressError::io(format!("Failed to create session store {}: {}", dir.display(), e)))?;
        info!("Created session store {}", dir.display());
        entry.dir = Some(dir.clone());
        Ok(dir)
    }

    /// Remove the store of `session`; never fails
    pub async fn destroy(&self, session: SessionId) {
        let entry = self.sessions.lock().await.remove(&session);
        let Some(entry) = entry else {
            debug!("Session {} already destroyed", session);
            return;
        };
        if let Some(view) = &entry.view_ref {
            self.views.lock().await.remove(view);
        }

        if let Some(dir) = &entry.dir {
            match tokio::fs::remove_dir_all(dir).await {
                Ok(()) => info!("Removed session store {}", dir.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!("Session store {} was already gone", dir.display())
                }
                Err(e) => warn!("Failed to remove session store {}: {}", dir.display(), e),
            }
        }
        Self::remove_if_empty(&entry.temp_root).await;
    }

    async fn remove_if_empty(temp_root: &Path) {
        if tokio::fs::remove_dir(temp_root).await.is_ok() {
            debug!("Removed empty temp root {}", temp_root.display());
        }
    }
}
