#![allow(dead_code)]

use std::sync::Arc;

use campus_client::config::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY};
use campus_client::{CampusClient, MemorySecureStore, SecureStore};
use wiremock::MockServer;

pub fn user_json() -> serde_json::Value {
    serde_json::json!({"id": 5, "email": "ana@campus.edu", "fullname": "Ana Ruiz"})
}

pub fn login_body(access: &str, refresh: &str) -> serde_json::Value {
    serde_json::json!({
        "access_token": access,
        "refresh_token": refresh,
        "token_type": "bearer",
        "expires_in": 1800,
        "user": user_json()
    })
}

pub fn token_pair(access: &str, refresh: &str) -> serde_json::Value {
    serde_json::json!({"access_token": access, "refresh_token": refresh})
}

/// A store holding a complete session.
pub fn seeded_store(access: &str, refresh: &str) -> MemorySecureStore {
    MemorySecureStore::with_entries([
        (ACCESS_TOKEN_KEY, access.to_string()),
        (REFRESH_TOKEN_KEY, refresh.to_string()),
        (USER_KEY, user_json().to_string()),
    ])
}

/// A client against `server` with its session restored from `store`.
pub async fn client_for(server: &MockServer, store: MemorySecureStore) -> CampusClient {
    let client = CampusClient::builder()
        .base_url(server.uri())
        .store(Arc::new(store))
        .refresh_on_restore(false)
        .build()
        .unwrap();
    client.session().restore().await.unwrap();
    client
}

pub async fn stored(store: &MemorySecureStore, key: &str) -> Option<String> {
    store.get(key).await.unwrap()
}
