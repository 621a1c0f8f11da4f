//! Observable authentication status.

use serde::Serialize;

use crate::models::auth::User;

/// Where the session stands, as published to observers.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", content = "user", rename_all = "snake_case")]
pub enum AuthStatus {
    /// Stored credentials have not been read yet.
    #[default]
    Loading,
    Authenticated(User),
    /// No session, either never established or ended by logout or a failed
    /// refresh.
    LoggedOut,
}

impl AuthStatus {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthStatus::Authenticated(_))
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, AuthStatus::Loading)
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            AuthStatus::Authenticated(user) => Some(user),
            _ => None,
        }
    }
}
