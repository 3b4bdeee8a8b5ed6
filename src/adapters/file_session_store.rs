//! File-based session store adapter.
//!
//! The session is stored as pretty JSON in `<storage_dir>/<storage_key>.json`
//! (by default `~/.neatrix/neatrix-user-auth-token.json`), so the admin and
//! customer apps keep separate sessions on the same machine.

use async_trait::async_trait;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::auth::Session;
use crate::config::BackendConfig;
use crate::traits::{SessionStore, StoreError};

/// File-based session store.
///
/// # Example
///
/// ```ignore
/// use neatrix_session::adapters::FileSessionStore;
/// use neatrix_session::traits::SessionStore;
///
/// let store = FileSessionStore::from_config(&config);
/// if let Some(session) = store.load().await? {
///     println!("Stored session for {}", session.user_id());
/// }
/// ```
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    /// Store `storage_key` inside `dir`.
    pub fn new(dir: impl AsRef<Path>, storage_key: &str) -> Self {
        Self {
            path: dir.as_ref().join(format!("{}.json", file_stem(storage_key))),
        }
    }

    pub fn from_config(config: &BackendConfig) -> Self {
        Self::new(config.resolved_storage_dir(), &config.storage_key)
    }

    /// Get the path to the session file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Keep storage keys from escaping the store directory.
fn file_stem(storage_key: &str) -> String {
    storage_key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect::<String>()
        .trim_start_matches('.')
        .to_string()
}

#[cfg(unix)]
fn restrict_permissions(file: &File) {
    use std::os::unix::fs::PermissionsExt;
    let _ = file.set_permissions(fs::Permissions::from_mode(0o600));
}

#[cfg(not(unix))]
fn restrict_permissions(_file: &File) {}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self) -> Result<Option<Session>, StoreError> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::LoadFailed(e.to_string())),
        };

        serde_json::from_reader(BufReader::new(file))
            .map(Some)
            .map_err(|e| StoreError::Corrupt(e.to_string()))
    }

    async fn save(&self, session: &Session) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| StoreError::SaveFailed(e.to_string()))?;
            }
        }

        let file = File::create(&self.path).map_err(|e| StoreError::SaveFailed(e.to_string()))?;
        restrict_permissions(&file);

        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, session)
            .map_err(|e| StoreError::SaveFailed(e.to_string()))?;
        writer
            .flush()
            .map_err(|e| StoreError::SaveFailed(e.to_string()))
    }

    async fn clear(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::ClearFailed(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::session::fixtures;
    use tempfile::TempDir;

    fn store(temp_dir: &TempDir) -> FileSessionStore {
        FileSessionStore::new(temp_dir.path().join("nested"), "neatrix-user-auth-token")
    }

    #[test]
    fn test_path_uses_storage_key() {
        let store = FileSessionStore::new("/tmp/x", "neatrix-admin-auth-token");
        assert_eq!(
            store.path(),
            Path::new("/tmp/x/neatrix-admin-auth-token.json")
        );
    }

    #[test]
    fn test_storage_key_cannot_escape_directory() {
        let store = FileSessionStore::new("/tmp/x", "../../etc/passwd");
        assert!(store.path().starts_with("/tmp/x"));
        assert_eq!(store.path().parent(), Some(Path::new("/tmp/x")));
    }

    #[test]
    fn test_from_config_uses_storage_dir() {
        let config = BackendConfig::new("https://abc.supabase.co", "k").with_storage_dir("/tmp/y");
        let store = FileSessionStore::from_config(&config);
        assert_eq!(store.path(), Path::new("/tmp/y/neatrix-user-auth-token.json"));
    }

    #[tokio::test]
    async fn test_load_nonexistent() {
        let temp_dir = TempDir::new().unwrap();
        assert_eq!(store(&temp_dir).load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_save_creates_dir_and_round_trips() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        let session = fixtures::session("u1", "jane@example.com", 3600);

        store.save(&session).await.unwrap();
        assert!(store.path().exists());
        assert_eq!(store.load().await.unwrap(), Some(session));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_saved_file_is_private() {
        use std::os::unix::fs::PermissionsExt;
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        store
            .save(&fixtures::session("u1", "jane@example.com", 3600))
            .await
            .unwrap();
        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn test_clear_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        store
            .save(&fixtures::session("u1", "jane@example.com", 3600))
            .await
            .unwrap();

        store.clear().await.unwrap();
        assert!(!store.path().exists());
        store.clear().await.unwrap();
        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_load_corrupt_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "not valid json").unwrap();

        let err = store.load().await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(_)));
    }
}
