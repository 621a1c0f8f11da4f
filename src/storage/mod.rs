//! Secure key-value storage for session credentials.
//!
//! Provides the [`SecureStore`] trait and implementations:
//! - [`FileSecureStore`] - JSON file with 0600 permissions
//! - [`MemorySecureStore`] - In-memory (testing, ephemeral sessions)
//! - [`KeyringSecureStore`] - System keyring (feature-gated)

mod file;
mod memory;

#[cfg(feature = "system-keyring")]
mod keyring;

use std::sync::Arc;

use async_trait::async_trait;

pub use file::FileSecureStore;
pub use memory::MemorySecureStore;

#[cfg(feature = "system-keyring")]
pub use keyring::KeyringSecureStore;

use crate::config::{StorageBackend, StorageConfig};
use crate::error::Result;

/// Trait for secure storage backends.
///
/// A flat string key-value store. The session keeps the access token, the
/// refresh token and the user record under the keys defined in
/// [`crate::config`].
#[async_trait]
pub trait SecureStore: Send + Sync {
    /// Read the value stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Delete `key`. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Name of this storage backend.
    fn name(&self) -> &str {
        "unknown"
    }
}

/// Blanket impl for `Arc<T>`.
#[async_trait]
impl<T: SecureStore + ?Sized> SecureStore for Arc<T> {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key).await
    }
    async fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value).await
    }
    async fn delete(&self, key: &str) -> Result<()> {
        (**self).delete(key).await
    }
    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Blanket impl for `Box<T>`.
#[async_trait]
impl<T: SecureStore + ?Sized> SecureStore for Box<T> {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key).await
    }
    async fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value).await
    }
    async fn delete(&self, key: &str) -> Result<()> {
        (**self).delete(key).await
    }
    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Build the store selected by the configuration.
pub fn from_config(config: &StorageConfig) -> Arc<dyn SecureStore> {
    match config.backend {
        StorageBackend::File => Arc::new(FileSecureStore::new(&config.path)),
        #[cfg(feature = "system-keyring")]
        StorageBackend::Keyring => Arc::new(KeyringSecureStore::with_service(
            config.keyring_service.as_str(),
        )),
        #[cfg(not(feature = "system-keyring"))]
        StorageBackend::Keyring => {
            tracing::warn!(
                "Keyring storage requested but system-keyring feature not enabled, falling back to file storage"
            );
            Arc::new(FileSecureStore::new(&config.path))
        }
        StorageBackend::Memory => Arc::new(MemorySecureStore::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_from_config_memory() {
        let config = StorageConfig {
            backend: StorageBackend::Memory,
            ..StorageConfig::default()
        };
        let store = from_config(&config);
        assert_eq!(store.name(), "memory");
        store.set("auth_token", "abc").await.unwrap();
        assert_eq!(store.get("auth_token").await.unwrap().as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn test_from_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig {
            backend: StorageBackend::File,
            path: dir.path().join("credentials.json"),
            ..StorageConfig::default()
        };
        let store = from_config(&config);
        assert_eq!(store.name(), "file");
    }
}
