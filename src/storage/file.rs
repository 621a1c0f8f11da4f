//! File-based secure store.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use super::SecureStore;
use crate::error::{Error, Result};

/// File permissions for the credentials file (Unix only): owner read/write.
#[cfg(unix)]
const FILE_MODE: u32 = 0o600;

/// Directory permissions (Unix only): owner read/write/execute.
#[cfg(unix)]
const DIR_MODE: u32 = 0o700;

/// File-based store: one JSON object mapping keys to values.
///
/// # Security
/// - The file is written with 0600 permissions on Unix
/// - A missing parent directory is created with 0700 permissions
#[derive(Debug)]
pub struct FileSecureStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl FileSecureStore {
    /// Create a store backed by the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<BTreeMap<String, String>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(Error::storage_io(&self.path, e.to_string())),
        };
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&content).map_err(|e| Error::StorageSerialization(e.to_string()))
    }

    async fn write_all(&self, data: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| Error::storage_io(parent, e.to_string()))?;

                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    let perms = std::fs::Permissions::from_mode(DIR_MODE);
                    tokio::fs::set_permissions(parent, perms)
                        .await
                        .map_err(|e| Error::storage_io(parent, format!("chmod: {}", e)))?;
                }
            }
        }

        let content = serde_json::to_string_pretty(data)
            .map_err(|e| Error::StorageSerialization(e.to_string()))?;

        // Write a temp file and rename it over the real one. On Unix the temp
        // file is created 0600 so tokens are never readable by other users.
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomically(&path, content.as_bytes()))
            .await
            .map_err(|e| Error::storage_io(&self.path, format!("write task failed: {}", e)))??;

        debug!(path = %self.path.display(), "Credentials file written");
        Ok(())
    }
}

fn write_atomically(path: &Path, content: &[u8]) -> Result<()> {
    let temp_path = path.with_extension("tmp");

    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(FILE_MODE)
            .open(&temp_path)
            .map_err(|e| Error::storage_io(&temp_path, format!("create: {}", e)))?;
        file.write_all(content)
            .map_err(|e| Error::storage_io(&temp_path, format!("write: {}", e)))?;
        file.sync_all()
            .map_err(|e| Error::storage_io(&temp_path, format!("sync: {}", e)))?;
    }

    #[cfg(not(unix))]
    {
        std::fs::write(&temp_path, content)
            .map_err(|e| Error::storage_io(&temp_path, format!("write: {}", e)))?;
    }

    if let Err(e) = std::fs::rename(&temp_path, path) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(Error::storage_io(path, format!("rename: {}", e)));
    }
    Ok(())
}

#[async_trait]
impl SecureStore for FileSecureStore {
    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let data = self.read_all().await?;
        Ok(data.get(key).cloned())
    }

    #[instrument(skip(self, value))]
    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut data = self.read_all().await?;
        data.insert(key.to_string(), value.to_string());
        self.write_all(&data).await
    }

    #[instrument(skip(self))]
    async fn delete(&self, key: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut data = self.read_all().await?;
        if data.remove(key).is_none() {
            return Ok(());
        }
        self.write_all(&data).await
    }

    fn name(&self) -> &str {
        "file"
    }
}
