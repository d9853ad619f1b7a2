use std::path::{Path, PathBuf};

use fs2::FileExt;
use tokio::fs;
use tracing::{debug, info};

use crate::errors::{AuthError, Result};
use crate::session::Session;
use crate::store::SessionStore;

const SESSION_FILE: &str = "session.json";
const LOCK_FILE: &str = "lock";

/// File-backed session store.
///
/// Persists the session as indented plaintext JSON in the per-user
/// application directory, with owner-only permissions on both the directory
/// and the file. An advisory lock file serializes mutation between
/// processes sharing the same directory.
///
/// # Directory Structure
/// ```text
/// ~/.config/hytide/
/// ├── session.json    # The persisted session
/// └── lock            # Advisory lock file
/// ```
#[derive(Debug)]
pub struct FileSessionStore {
    session_path: PathBuf,
    lock_path: PathBuf,
}

impl FileSessionStore {
    /// Create a store rooted at `storage_dir`. The directory is created on
    /// first save, not here.
    pub fn new(storage_dir: impl AsRef<Path>) -> Self {
        let storage_dir = storage_dir.as_ref();
        Self {
            session_path: storage_dir.join(SESSION_FILE),
            lock_path: storage_dir.join(LOCK_FILE),
        }
    }

    /// Default per-user application directory for the current platform
    pub fn default_storage_dir() -> Result<PathBuf> {
        let project_dirs = directories::ProjectDirs::from("", "", "hytide")
            .ok_or(AuthError::ProjectDirectoriesUnavailable)?;
        Ok(project_dirs.config_dir().to_path_buf())
    }

    pub fn session_path(&self) -> &Path {
        &self.session_path
    }

    /// Exclusive advisory lock held for the duration of one mutation
    fn acquire_lock(&self) -> Result<std::fs::File> {
        let lock_file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&self.lock_path)?;

        lock_file
            .try_lock_exclusive()
            .map_err(|_| AuthError::StoreLocked)?;

        Ok(lock_file)
    }

    async fn ensure_storage_dir(&self) -> Result<()> {
        let dir = self
            .session_path
            .parent()
            .ok_or(AuthError::ProjectDirectoriesUnavailable)?;
        fs::create_dir_all(dir).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o700);
            std::fs::set_permissions(dir, perms)?;
        }

        Ok(())
    }
}

#[async_trait::async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self) -> Result<Option<Session>> {
        let content = match fs::read_to_string(&self.session_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No session file at {}", self.session_path.display());
                return Ok(None);
            }
            Err(e) => return Err(AuthError::SessionRead(e.to_string())),
        };

        let session: Session = serde_json::from_str(&content)
            .map_err(|e| AuthError::SessionRead(format!("invalid session file: {e}")))?;

        Ok(Some(session))
    }

    async fn save(&self, session: &Session) -> Result<()> {
        self.ensure_storage_dir().await?;
        let _lock = self.acquire_lock()?;

        let json = serde_json::to_string_pretty(session)?;

        // Atomic write: temp file, sync, rename. The temp file is owner-only
        // from the moment it exists; credential material must never touch
        // disk with wider permissions, even transiently.
        let temp_path = self.session_path.with_extension("tmp");
        {
            use std::io::Write;

            let mut open_opts = std::fs::OpenOptions::new();
            open_opts.create(true).truncate(true).write(true);
            #[cfg(unix)]
            {
                use std::os::unix::fs::OpenOptionsExt;
                open_opts.mode(0o600);
            }
            let mut file = open_opts.open(&temp_path)?;
            // A temp file left over from an interrupted save keeps its old
            // mode on open, so tighten it unconditionally
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
            }
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&temp_path, &self.session_path).await?;

        info!(
            username = %session.username,
            uuid = %session.uuid,
            "Session saved"
        );
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        // Clearing a store whose directory was never created is a no-op
        let _lock = match self.acquire_lock() {
            Ok(lock) => Some(lock),
            Err(AuthError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e),
        };

        match fs::remove_file(&self.session_path).await {
            Ok(()) => info!("Session cleared"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }
}
