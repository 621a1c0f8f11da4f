//! # campus-client
//!
//! Authenticated REST client for a Moodle campus backend.
//!
//! Requests carry the session's bearer token. When the backend answers
//! `401 Unauthorized`, the client exchanges the stored refresh token for a new
//! pair exactly once, however many requests failed at the same time, and
//! replays each failed request once with the new token. If the exchange
//! fails, the stored credentials are purged and every waiting request gets
//! [`Error::RefreshFailed`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use campus_client::{CampusClient, FileSecureStore, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = CampusClient::builder()
//!         .base_url("http://localhost:8000")
//!         .store(Arc::new(FileSecureStore::new("credentials.json")))
//!         .build()?;
//!
//!     if !client.auth().load_stored_auth().await?.is_authenticated() {
//!         client.auth().dev_login(Some("ana@campus.edu")).await?;
//!     }
//!
//!     for course in client.courses().list().await? {
//!         println!("{}", course.fullname);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `system-keyring` (default) - Enable the system keyring credential store

pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod storage;
pub mod transport;

pub use auth::{AuthStatus, SessionManager};
pub use client::{CampusClient, CampusClientBuilder};
pub use config::Config;
pub use error::{Error, RefreshFailure, Result};
pub use models::auth::{CredentialPair, User};
pub use storage::{FileSecureStore, MemorySecureStore, SecureStore};
pub use transport::{ApiRequest, ApiResponse, Middleware, Next};

#[cfg(feature = "system-keyring")]
pub use storage::KeyringSecureStore;
