//! Main client entry point.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tracing::info;

use crate::api::{AssignmentsApi, AuthApi, CoursesApi, ForumsApi};
use crate::auth::{AuthStatus, SessionManager};
use crate::config::{
    CONNECT_TIMEOUT, Config, DEFAULT_BASE_URL, REQUEST_TIMEOUT, SessionConfig, USER_AGENT,
};
use crate::error::Result;
use crate::storage::{self, MemorySecureStore, SecureStore};
use crate::transport::{
    ApiRequest, ApiResponse, AuthMiddleware, HttpTransport, Pipeline, TracingMiddleware,
};

/// Campus API client.
///
/// Every call goes through the request pipeline, so an expired access token
/// is refreshed and the call replayed without the caller noticing.
///
/// # Examples
///
/// ```rust,no_run
/// use campus_client::CampusClient;
///
/// # async fn example() -> campus_client::Result<()> {
/// let client = CampusClient::builder()
///     .base_url("https://campus.example.edu/api")
///     .build()?;
///
/// client.auth().load_stored_auth().await?;
/// for course in client.courses().list().await? {
///     println!("{} {}", course.id, course.fullname);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct CampusClient {
    session: Arc<SessionManager>,
    pipeline: Pipeline,
    session_config: SessionConfig,
}

impl CampusClient {
    /// Create a builder for configuring the client.
    pub fn builder() -> CampusClientBuilder {
        CampusClientBuilder::new()
    }

    /// Send a request through the pipeline.
    ///
    /// Non-2xx responses are returned as responses; only transport failures
    /// and refresh failures are errors.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        self.pipeline.send(request).await
    }

    /// GET `path` and decode a successful JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(ApiRequest::get(path))
            .await?
            .error_for_status()?
            .json()
    }

    /// POST `body` to `path` and decode a successful JSON body.
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(ApiRequest::post(path).json(body)?)
            .await?
            .error_for_status()?
            .json()
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    pub fn status(&self) -> AuthStatus {
        self.session.status()
    }

    /// Watch authentication status changes.
    pub fn subscribe(&self) -> watch::Receiver<AuthStatus> {
        self.session.subscribe()
    }

    pub fn session_config(&self) -> &SessionConfig {
        &self.session_config
    }

    pub fn auth(&self) -> AuthApi<'_> {
        AuthApi::new(self)
    }

    pub fn courses(&self) -> CoursesApi<'_> {
        CoursesApi::new(self)
    }

    pub fn assignments(&self) -> AssignmentsApi<'_> {
        AssignmentsApi::new(self)
    }

    pub fn forums(&self) -> ForumsApi<'_> {
        ForumsApi::new(self)
    }
}

/// Builder for [`CampusClient`].
pub struct CampusClientBuilder {
    base_url: String,
    store: Option<Arc<dyn SecureStore>>,
    reqwest_client: Option<reqwest::Client>,
    request_timeout: Duration,
    connect_timeout: Duration,
    user_agent: String,
    session: SessionConfig,
}

impl CampusClientBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            store: None,
            reqwest_client: None,
            request_timeout: REQUEST_TIMEOUT,
            connect_timeout: CONNECT_TIMEOUT,
            user_agent: USER_AGENT.to_string(),
            session: SessionConfig::default(),
        }
    }

    /// Start from a loaded [`Config`]: API settings, storage backend and
    /// session behaviour.
    pub fn from_config(config: &Config) -> Self {
        Self {
            base_url: config.api.base_url.clone(),
            store: Some(storage::from_config(&config.storage)),
            reqwest_client: None,
            request_timeout: config.api.request_timeout(),
            connect_timeout: config.api.connect_timeout(),
            user_agent: config.api.user_agent.clone(),
            session: config.session.clone(),
        }
    }

    /// Set the API base URL.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the credential store. Defaults to an in-memory store.
    pub fn store(mut self, store: Arc<dyn SecureStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set a custom reqwest client. Timeouts and user agent set on this
    /// builder are ignored in that case.
    pub fn reqwest_client(mut self, client: reqwest::Client) -> Self {
        self.reqwest_client = Some(client);
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Whether [`AuthApi::load_stored_auth`] validates a restored session
    /// with a background refresh.
    pub fn refresh_on_restore(mut self, enabled: bool) -> Self {
        self.session.refresh_on_restore = enabled;
        self
    }

    /// Build the client. Stored credentials are not read until
    /// [`AuthApi::load_stored_auth`] or [`SessionManager::restore`] runs.
    pub fn build(self) -> Result<CampusClient> {
        let transport = match self.reqwest_client {
            Some(client) => HttpTransport::with_client(client, &self.base_url)?,
            None => HttpTransport::with_timeouts(
                &self.base_url,
                &self.user_agent,
                self.connect_timeout,
                self.request_timeout,
            )?,
        };
        let transport = Arc::new(transport);

        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemorySecureStore::new()));
        let session = Arc::new(SessionManager::new(store, Arc::clone(&transport)));

        let pipeline = Pipeline::new(transport)
            .with(AuthMiddleware::new(Arc::clone(&session)))
            .with(TracingMiddleware);

        info!(base_url = %self.base_url, store = session.store().name(), "CampusClient initialized");
        Ok(CampusClient {
            session,
            pipeline,
            session_config: self.session,
        })
    }
}

impl Default for CampusClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
