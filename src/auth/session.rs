//! Session lifecycle manager.
//!
//! Owns the credential cache, the refresh-in-flight flag and the queue of
//! requests waiting on that refresh. Every 401 recovery goes through
//! [`SessionManager::recover_from_unauthorized`], which guarantees at most one
//! refresh exchange at a time: the first caller runs it, everyone arriving
//! while it is in flight waits for its outcome.
//!
//! Logins and logouts start a new session epoch. A refresh that settles after
//! the epoch moved on wakes its waiters but leaves the store and the cache to
//! the newer session.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{oneshot, watch};
use tracing::{debug, info, warn};

use super::AuthStatus;
use super::refresh;
use crate::config::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY};
use crate::error::{Error, RefreshFailure, Result};
use crate::models::auth::{CredentialPair, User};
use crate::storage::SecureStore;
use crate::transport::HttpTransport;

/// What every participant of one refresh cycle receives.
pub type RefreshOutcome = std::result::Result<CredentialPair, RefreshFailure>;

#[derive(Default)]
struct SessionState {
    credentials: Option<CredentialPair>,
    /// Bumped by every login and logout.
    epoch: u64,
    /// At most one exchange runs while this is set.
    refreshing: bool,
    /// Non-empty only while `refreshing` is set.
    pending: Vec<oneshot::Sender<RefreshOutcome>>,
}

/// How a caller takes part in a refresh cycle, decided under the lock.
enum Role {
    /// Runs the exchange, started in the given epoch.
    Leader(u64),
    /// Waits for the running exchange.
    Follower(oneshot::Receiver<RefreshOutcome>),
    /// A newer token than the one that failed is already cached.
    Settled(CredentialPair),
}

/// Manages the authenticated session.
///
/// Thread-safe: the state sits behind a `std::sync::Mutex` that is never held
/// across an `.await`, so it can be shared across tasks in an `Arc`.
pub struct SessionManager {
    store: Arc<dyn SecureStore>,
    transport: Arc<HttpTransport>,
    state: Mutex<SessionState>,
    /// Held across every store write that depends on the epoch.
    writes: tokio::sync::Mutex<()>,
    status: watch::Sender<AuthStatus>,
}

impl SessionManager {
    /// Create a manager with an empty cache. Call [`restore`](Self::restore)
    /// to load stored credentials.
    pub fn new(store: Arc<dyn SecureStore>, transport: Arc<HttpTransport>) -> Self {
        let (status, _) = watch::channel(AuthStatus::Loading);
        Self {
            store,
            transport,
            state: Mutex::new(SessionState::default()),
            writes: tokio::sync::Mutex::new(()),
            status,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current access token, if a session is cached.
    pub fn access_token(&self) -> Option<String> {
        self.lock()
            .credentials
            .as_ref()
            .map(|c| c.access_token.clone())
    }

    /// Snapshot of the cached credential pair.
    pub fn credentials(&self) -> Option<CredentialPair> {
        self.lock().credentials.clone()
    }

    /// Whether a refresh exchange is in flight.
    pub fn is_refreshing(&self) -> bool {
        self.lock().refreshing
    }

    pub fn status(&self) -> AuthStatus {
        self.status.borrow().clone()
    }

    /// Watch status changes, including the logout caused by a failed refresh.
    pub fn subscribe(&self) -> watch::Receiver<AuthStatus> {
        self.status.subscribe()
    }

    pub fn store(&self) -> &Arc<dyn SecureStore> {
        &self.store
    }

    /// Load credentials and user from the store into memory.
    ///
    /// The session counts as authenticated when both an access token and a
    /// user record are stored. A store failure leaves the session logged out.
    pub async fn restore(&self) -> Result<AuthStatus> {
        let loaded = match self.load_stored().await {
            Ok(loaded) => loaded,
            Err(e) => {
                self.status.send_replace(AuthStatus::LoggedOut);
                return Err(e);
            }
        };
        let (credentials, user) = loaded;

        let status = match (&credentials, user) {
            (Some(_), Some(user)) => AuthStatus::Authenticated(user),
            _ => AuthStatus::LoggedOut,
        };
        self.lock().credentials = credentials;
        self.status.send_replace(status.clone());

        info!(
            source = self.store.name(),
            authenticated = status.is_authenticated(),
            "Restored session from storage"
        );
        Ok(status)
    }

    async fn load_stored(&self) -> Result<(Option<CredentialPair>, Option<User>)> {
        let access = self.store.get(ACCESS_TOKEN_KEY).await?;
        let refresh = self.store.get(REFRESH_TOKEN_KEY).await?;
        let user = match self.store.get(USER_KEY).await? {
            Some(raw) => match serde_json::from_str::<User>(&raw) {
                Ok(user) => Some(user),
                Err(e) => {
                    warn!("Ignoring unreadable stored user: {}", e);
                    None
                }
            },
            None => None,
        };

        let credentials = access
            .filter(|token| !token.is_empty())
            .map(|token| CredentialPair::new(token, refresh.unwrap_or_default()));
        Ok((credentials, user))
    }

    /// Start a session after a successful login.
    ///
    /// A refresh still in flight from the previous session settles without
    /// touching the new one.
    pub async fn establish(&self, credentials: CredentialPair, user: User) -> Result<()> {
        let _writes = self.writes.lock().await;
        self.persist(&credentials, Some(&user)).await?;
        {
            let mut state = self.lock();
            state.epoch += 1;
            state.credentials = Some(credentials);
        }
        info!(user_id = user.id, "Session established");
        self.status.send_replace(AuthStatus::Authenticated(user));
        Ok(())
    }

    /// End the session: drop the cache, purge the store.
    ///
    /// A refresh in flight is not cancelled, but its result is discarded.
    pub async fn clear(&self) {
        let _writes = self.writes.lock().await;
        {
            let mut state = self.lock();
            state.epoch += 1;
            state.credentials = None;
        }
        self.purge().await;
        self.status.send_replace(AuthStatus::LoggedOut);
        info!("Session cleared");
    }

    /// Refresh the credentials now, or join the refresh already in flight.
    pub async fn refresh(&self) -> Result<CredentialPair> {
        self.single_flight(None).await
    }

    /// Obtain a token to replay a request that got `401` while carrying
    /// `sent_with` (empty when it carried none).
    ///
    /// Returns the cached token without an exchange when it already differs
    /// from `sent_with`; otherwise starts or joins a refresh.
    pub async fn recover_from_unauthorized(&self, sent_with: &str) -> Result<String> {
        let credentials = self.single_flight(Some(sent_with)).await?;
        Ok(credentials.access_token)
    }

    async fn single_flight(&self, stale: Option<&str>) -> Result<CredentialPair> {
        let role = {
            let mut state = self.lock();
            if state.refreshing {
                let (tx, rx) = oneshot::channel();
                state.pending.push(tx);
                Role::Follower(rx)
            } else {
                let newer = stale.and_then(|sent| {
                    state
                        .credentials
                        .clone()
                        .filter(|c| !c.access_token.is_empty() && c.access_token != sent)
                });
                match newer {
                    Some(credentials) => Role::Settled(credentials),
                    None => {
                        state.refreshing = true;
                        Role::Leader(state.epoch)
                    }
                }
            }
        };

        match role {
            Role::Follower(rx) => {
                debug!("Waiting for in-flight refresh");
                match rx.await {
                    Ok(outcome) => outcome.map_err(Error::from),
                    Err(_) => Err(Error::RefreshAborted),
                }
            }
            Role::Settled(credentials) => {
                debug!("Newer token already cached, skipping refresh");
                Ok(credentials)
            }
            Role::Leader(epoch) => self.lead_refresh(epoch).await,
        }
    }

    async fn lead_refresh(&self, epoch: u64) -> Result<CredentialPair> {
        let guard = InFlight {
            session: self,
            armed: true,
        };

        let exchanged = self.exchange().await;

        // Logins and logouts wait here, so the epoch holds until settled.
        let _writes = self.writes.lock().await;
        if self.lock().epoch != epoch {
            debug!("Session changed during refresh, discarding its result");
            return guard.supersede().map_err(Error::from);
        }

        let stored = match exchanged {
            Ok((credentials, user)) => match self.persist(&credentials, user.as_ref()).await {
                Ok(()) => Ok((credentials, user)),
                Err(e) => Err(RefreshFailure::other(format!(
                    "Failed to persist refreshed tokens: {}",
                    e
                ))),
            },
            Err(failure) => Err(failure),
        };

        match stored {
            Ok((credentials, user)) => {
                guard.settle(Ok(credentials.clone()));
                if let Some(user) = user {
                    self.status.send_replace(AuthStatus::Authenticated(user));
                }
                info!("Token refreshed successfully");
                Ok(credentials)
            }
            Err(failure) => {
                warn!(error = %failure, "Token refresh failed, ending session");
                // Store is empty before any waiter wakes up.
                self.purge().await;
                guard.settle(Err(failure.clone()));
                self.status.send_replace(AuthStatus::LoggedOut);
                Err(Error::RefreshFailed(failure))
            }
        }
    }

    /// Read the stored refresh token and trade it for a new pair.
    async fn exchange(
        &self,
    ) -> std::result::Result<(CredentialPair, Option<User>), RefreshFailure> {
        let refresh_token = match self.store.get(REFRESH_TOKEN_KEY).await {
            Ok(Some(token)) if !token.is_empty() => token,
            Ok(_) => return Err(RefreshFailure::other("No refresh token stored")),
            Err(e) => {
                return Err(RefreshFailure::other(format!(
                    "Failed to read refresh token: {}",
                    e
                )));
            }
        };

        let response = refresh::exchange(&self.transport, &refresh_token).await?;

        let mut credentials = CredentialPair::new(response.access_token, refresh_token);
        if !response.refresh_token.is_empty() {
            credentials.refresh_token = response.refresh_token;
        }
        Ok((credentials, response.user))
    }

    /// Publish the outcome: cache, wake every waiter, clear the flag, all in
    /// one critical section.
    fn settle(&self, outcome: RefreshOutcome) {
        let mut state = self.lock();
        state.credentials = outcome.as_ref().ok().cloned();
        Self::release(&mut state, &outcome);
    }

    /// Settle a refresh that outlived its session. Waiters get whatever the
    /// newer session holds, or a failure once logged out.
    fn settle_superseded(&self) -> RefreshOutcome {
        let mut state = self.lock();
        let outcome = state
            .credentials
            .clone()
            .ok_or_else(|| RefreshFailure::other("Session ended during refresh"));
        Self::release(&mut state, &outcome);
        outcome
    }

    fn release(state: &mut SessionState, outcome: &RefreshOutcome) {
        let waiters = std::mem::take(&mut state.pending);
        debug!(waiters = waiters.len(), "Settling refresh");
        for waiter in waiters {
            // A waiter whose caller went away has nothing to receive.
            let _ = waiter.send(outcome.clone());
        }
        state.refreshing = false;
    }

    async fn persist(&self, credentials: &CredentialPair, user: Option<&User>) -> Result<()> {
        self.store
            .set(ACCESS_TOKEN_KEY, &credentials.access_token)
            .await?;
        self.store
            .set(REFRESH_TOKEN_KEY, &credentials.refresh_token)
            .await?;
        if let Some(user) = user {
            self.store
                .set(USER_KEY, &serde_json::to_string(user)?)
                .await?;
        }
        Ok(())
    }

    /// Best-effort delete of everything the session stored.
    async fn purge(&self) {
        for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY] {
            if let Err(e) = self.store.delete(key).await {
                warn!(key, "Failed to delete stored credential: {}", e);
            }
        }
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("SessionManager")
            .field("store", &self.store.name())
            .field("has_credentials", &state.credentials.is_some())
            .field("refreshing", &state.refreshing)
            .field("pending", &state.pending.len())
            .finish()
    }
}

/// Held by the task running an exchange.
///
/// If that task is dropped before settling, waiters are released with
/// [`Error::RefreshAborted`] and the flag is cleared.
struct InFlight<'a> {
    session: &'a SessionManager,
    armed: bool,
}

impl InFlight<'_> {
    fn settle(mut self, outcome: RefreshOutcome) {
        self.armed = false;
        self.session.settle(outcome);
    }

    fn supersede(mut self) -> RefreshOutcome {
        self.armed = false;
        self.session.settle_superseded()
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.armed {
            warn!("Token refresh abandoned before settling");
            let mut state = self.session.lock();
            state.pending.clear();
            state.refreshing = false;
        }
    }
}
