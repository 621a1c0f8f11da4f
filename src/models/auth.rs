//! Authentication-related types.

use serde::{Deserialize, Serialize};

/// A campus user as returned by the login and `/auth/me` endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub fullname: String,
}

/// Access and refresh token held by the session.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
    /// Short-lived bearer credential.
    pub access_token: String,
    /// Longer-lived credential exchanged for a new access token.
    pub refresh_token: String,
}

impl CredentialPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

// Tokens never end up in logs.
impl std::fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// Response from `/auth/google` and `/auth/dev-login`.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    pub user: User,
}

impl LoginResponse {
    /// The credential pair carried by this response.
    pub fn credentials(&self) -> CredentialPair {
        CredentialPair::new(&self.access_token, &self.refresh_token)
    }
}

fn default_token_type() -> String {
    "bearer".to_string()
}

/// Body of the refresh exchange.
#[derive(Debug, Serialize)]
pub struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

/// Response from `/auth/refresh`.
#[derive(Debug, Deserialize)]
pub struct RefreshResponse {
    pub access_token: String,
    /// Empty when the server keeps the current refresh token.
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default)]
    pub user: Option<User>,
}

/// Body of `/auth/google`.
#[derive(Debug, Serialize)]
pub struct GoogleLoginRequest<'a> {
    pub id_token: &'a str,
}

/// Body of `/auth/dev-login`. A missing email lets the server pick its
/// default development account.
#[derive(Debug, Serialize)]
pub struct DevLoginRequest<'a> {
    pub email: Option<&'a str>,
}

/// Connectivity between the backend and Moodle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoodleStatus {
    pub connected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
