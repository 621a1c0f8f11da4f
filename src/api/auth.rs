//! Login, logout and session restore.

use reqwest::StatusCode;
use tracing::{info, warn};

use crate::auth::AuthStatus;
use crate::client::CampusClient;
use crate::config::{DEV_LOGIN_PATH, GOOGLE_LOGIN_PATH};
use crate::error::{Error, Result};
use crate::models::auth::{
    CredentialPair, DevLoginRequest, GoogleLoginRequest, LoginResponse, MoodleStatus, User,
};
use crate::transport::{ApiRequest, ApiResponse};

/// Authentication endpoints.
#[derive(Debug, Clone, Copy)]
pub struct AuthApi<'a> {
    client: &'a CampusClient,
}

impl<'a> AuthApi<'a> {
    pub(crate) fn new(client: &'a CampusClient) -> Self {
        Self { client }
    }

    /// Exchange a Google ID token for a campus session.
    ///
    /// POST `/auth/google`
    pub async fn login_with_google(self, id_token: &str) -> Result<User> {
        let request = ApiRequest::post(GOOGLE_LOGIN_PATH).json(&GoogleLoginRequest { id_token })?;
        let response = self.client.send(request).await?;

        let response = match response.status() {
            StatusCode::UNAUTHORIZED => return Err(Error::InvalidIdentityToken),
            StatusCode::FORBIDDEN => return Err(Error::NotEnrolled(response.error_message())),
            _ => response.error_for_status()?,
        };
        self.establish(response).await
    }

    /// Log in as a development user. The server decides whether this is
    /// allowed; `None` picks its default account.
    ///
    /// POST `/auth/dev-login`
    pub async fn dev_login(self, email: Option<&str>) -> Result<User> {
        let request = ApiRequest::post(DEV_LOGIN_PATH).json(&DevLoginRequest { email })?;
        let response = self.client.send(request).await?;

        let response = match response.status() {
            StatusCode::FORBIDDEN => return Err(Error::DevLoginDisabled),
            StatusCode::NOT_FOUND => return Err(Error::UserNotFound(response.error_message())),
            _ => response.error_for_status()?,
        };
        self.establish(response).await
    }

    async fn establish(self, response: ApiResponse) -> Result<User> {
        let login: LoginResponse = response.json()?;
        let user = login.user.clone();
        self.client
            .session()
            .establish(login.credentials(), login.user)
            .await?;
        info!(user_id = user.id, email = %user.email, "Logged in");
        Ok(user)
    }

    /// Refresh the credentials now, joining a refresh already in flight.
    pub async fn refresh(self) -> Result<CredentialPair> {
        self.client.session().refresh().await
    }

    /// GET `/auth/me`
    pub async fn current_user(self) -> Result<User> {
        self.client.get_json("/auth/me").await
    }

    /// GET `/auth/moodle-status`
    pub async fn moodle_status(self) -> Result<MoodleStatus> {
        self.client.get_json("/auth/moodle-status").await
    }

    /// Restore the stored session.
    ///
    /// When the session is restored as authenticated and
    /// `refresh_on_restore` is on, a refresh runs in the background to
    /// validate it. If that refresh fails the session ends and subscribers
    /// see [`AuthStatus::LoggedOut`].
    pub async fn load_stored_auth(self) -> Result<AuthStatus> {
        let session = self.client.session();
        let status = session.restore().await?;

        let has_refresh_token = session
            .credentials()
            .is_some_and(|c| !c.refresh_token.is_empty());
        if status.is_authenticated()
            && self.client.session_config().refresh_on_restore
            && has_refresh_token
        {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    let session = session.clone();
                    handle.spawn(async move {
                        if let Err(e) = session.refresh().await {
                            warn!("Background session validation failed: {}", e);
                        }
                    });
                }
                Err(_) => warn!("No Tokio runtime, skipping background session validation"),
            }
        }

        Ok(status)
    }

    /// End the session locally.
    pub async fn logout(self) {
        self.client.session().clear().await;
    }
}
