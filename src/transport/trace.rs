//! Per-request logging stage.

use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{ApiRequest, ApiResponse, Middleware, Next};
use crate::error::Result;

/// Logs every attempt that reaches the wire.
///
/// Placed after [`super::AuthMiddleware`] so replays after a refresh show up
/// as separate entries with `retried = true`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingMiddleware;

#[async_trait]
impl Middleware for TracingMiddleware {
    async fn handle(&self, request: ApiRequest, next: Next<'_>) -> Result<ApiResponse> {
        let id = request.id();
        let method = request.method().clone();
        let path = request.path().to_string();
        let retried = request.is_retried();
        let started = Instant::now();

        let result = next.run(request).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match &result {
            Ok(response) if response.status().is_server_error() => {
                warn!(%id, %method, %path, status = response.status().as_u16(), retried, elapsed_ms, "Server error");
            }
            Ok(response) => {
                debug!(%id, %method, %path, status = response.status().as_u16(), retried, elapsed_ms, "Request completed");
            }
            Err(e) => {
                warn!(%id, %method, %path, retried, elapsed_ms, error = %e, "Request failed");
            }
        }

        result
    }

    fn name(&self) -> &str {
        "tracing"
    }
}
