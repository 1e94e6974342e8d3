//! Last-session file.
//!
//! One-shot commands have no resident host, so the session paired by `pair`
//! (or entered with `session set`) is kept in a small TOML file and restored
//! into the session store on the next run.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use rsc_core::Session;

#[derive(Debug, Error)]
pub enum SessionFileError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse session file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize session: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// On-disk form of the last session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedSession {
    /// RFC 3339 time of the save
    pub saved_at: String,
    pub session: Session,
}

pub struct LastSessionStore {
    path: PathBuf,
}

impl LastSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<SavedSession>, SessionFileError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)?;
        let saved: SavedSession = toml::from_str(&content)?;
        debug!(path = %self.path.display(), "loaded last session");
        Ok(Some(saved))
    }

    pub fn save(&self, session: &Session) -> Result<SavedSession, SessionFileError> {
        let saved = SavedSession {
            saved_at: chrono::Utc::now().to_rfc3339(),
            session: session.clone(),
        };
        let content = toml::to_string_pretty(&saved)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        write_private(&self.path, content.as_bytes())?;
        debug!(path = %self.path.display(), "saved last session");
        Ok(saved)
    }

    /// Delete the file. Returns whether there was one.
    pub fn clear(&self) -> Result<bool, SessionFileError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

// The file holds the bearer token in clear, so it is owner-only from creation.
#[cfg(unix)]
fn write_private(path: &Path, content: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // mode() only applies on create; tighten a file left by an older run
    file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    file.write_all(content)?;
    file.sync_all()
}

#[cfg(not(unix))]
fn write_private(path: &Path, content: &[u8]) -> std::io::Result<()> {
    std::fs::write(path, content)
}
