//! Keyring-based secure store.

use async_trait::async_trait;
use tracing::instrument;

use super::SecureStore;
use crate::error::{Error, Result};

/// Keyring-based store.
///
/// Each key becomes one entry in the system credential store under a shared
/// service name. Feature-gated behind `system-keyring`.
#[derive(Debug, Clone)]
pub struct KeyringSecureStore {
    service: String,
}

impl Default for KeyringSecureStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyringSecureStore {
    /// Default service name for keyring entries.
    const SERVICE_NAME: &str = "campus-client";

    /// Create a store with the default service name.
    pub fn new() -> Self {
        Self::with_service(Self::SERVICE_NAME)
    }

    /// Create a store with a custom service name.
    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<keyring::Entry> {
        keyring::Entry::new(&self.service, key)
            .map_err(|e| Error::Keyring(format!("Failed to create keyring entry: {}", e)))
    }
}

#[async_trait]
impl SecureStore for KeyringSecureStore {
    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> Result<Option<String>> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(Error::Keyring(e.to_string())),
        }
    }

    #[instrument(skip(self, value))]
    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entry(key)?
            .set_password(value)
            .map_err(|e| Error::Keyring(e.to_string()))
    }

    #[instrument(skip(self))]
    async fn delete(&self, key: &str) -> Result<()> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(Error::Keyring(e.to_string())),
        }
    }

    fn name(&self) -> &str {
        "keyring"
    }
}
