//! Refresh token exchange.

use tracing::{debug, info};

use crate::config::REFRESH_PATH;
use crate::error::RefreshFailure;
use crate::models::auth::{RefreshRequest, RefreshResponse};
use crate::transport::{ApiRequest, HttpTransport};

/// Exchange a refresh token for a new credential pair.
///
/// POST `/auth/refresh`
/// Body: `{"refresh_token": "..."}`
///
/// Goes straight to the transport: the refresh call must never pass through
/// the auth stage that triggered it.
pub(crate) async fn exchange(
    transport: &HttpTransport,
    refresh_token: &str,
) -> std::result::Result<RefreshResponse, RefreshFailure> {
    if refresh_token.is_empty() {
        return Err(RefreshFailure::other("No refresh token available"));
    }

    info!("Refreshing access token...");

    let request = ApiRequest::post(REFRESH_PATH)
        .json(&RefreshRequest { refresh_token })
        .map_err(|e| RefreshFailure::other(format!("Failed to encode refresh request: {}", e)))?;

    let response = transport
        .execute(request)
        .await
        .map_err(|e| RefreshFailure::other(format!("Refresh request failed: {}", e)))?;

    if !response.is_success() {
        return Err(RefreshFailure::rejected(
            response.status().as_u16(),
            response.error_message(),
        ));
    }

    let data: RefreshResponse = response
        .json()
        .map_err(|e| RefreshFailure::other(format!("Failed to parse refresh response: {}", e)))?;

    if data.access_token.is_empty() {
        return Err(RefreshFailure::other(
            "Response does not contain access_token",
        ));
    }

    debug!("Refresh exchange succeeded");
    Ok(data)
}
