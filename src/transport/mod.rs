//! Request pipeline.
//!
//! Every API call is an [`ApiRequest`] that passes through an ordered list of
//! [`Middleware`] stages before reaching the [`HttpTransport`]:
//!
//! ```text
//! caller -> AuthMiddleware -> TracingMiddleware -> HttpTransport -> backend
//! ```
//!
//! [`AuthMiddleware`] attaches the bearer credential and drives the refresh
//! and replay protocol on `401 Unauthorized`.

mod auth;
mod http;
mod pipeline;
mod request;
mod trace;

pub use auth::AuthMiddleware;
pub use http::HttpTransport;
pub use pipeline::{Middleware, Next, Pipeline};
pub use request::{ApiRequest, ApiResponse};
pub use trace::TracingMiddleware;
