//! Bearer credential stage with refresh-and-replay on 401.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;

use super::{ApiRequest, ApiResponse, Middleware, Next};
use crate::auth::SessionManager;
use crate::error::Result;

/// Attaches the session's access token and recovers from `401 Unauthorized`.
///
/// On a 401 for a request that has not been replayed yet and does not target
/// a login or refresh endpoint, the stage asks the [`SessionManager`] for a
/// usable token (starting or joining the single in-flight refresh) and replays
/// the request once. A refresh failure is returned to the caller as
/// [`crate::Error::RefreshFailed`]; the session is already cleared by then.
#[derive(Debug, Clone)]
pub struct AuthMiddleware {
    session: Arc<SessionManager>,
}

impl AuthMiddleware {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl Middleware for AuthMiddleware {
    async fn handle(&self, mut request: ApiRequest, next: Next<'_>) -> Result<ApiResponse> {
        if let Some(token) = self.session.access_token() {
            request.set_bearer(&token)?;
        }

        let recoverable = !request.is_retried() && !request.is_auth_endpoint();
        let replay = recoverable.then(|| request.clone());

        let response = next.run(request).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }
        let Some(mut replay) = replay else {
            return Ok(response);
        };

        let sent_with = replay.bearer_token().unwrap_or_default().to_string();
        debug!(id = %replay.id(), path = %replay.path(), "Unauthorized, recovering session");

        let token = self.session.recover_from_unauthorized(&sent_with).await?;
        replay.mark_retried();
        replay.set_bearer(&token)?;
        next.run(replay).await
    }

    fn name(&self) -> &str {
        "auth"
    }
}
