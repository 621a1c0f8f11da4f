//! Request and response values that travel through the pipeline.

use bytes::Bytes;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::config::is_auth_endpoint;
use crate::error::{Error, Result};

/// An outbound API call, relative to the client's base URL.
///
/// Cloneable so the auth stage can replay it after a refresh.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    body: Option<serde_json::Value>,
    id: Uuid,
    retried: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
            id: Uuid::new_v4(),
            retried: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// Attach a JSON body.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    /// Append a query parameter.
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Set an extra header.
    pub fn header(mut self, name: HeaderName, value: &str) -> Result<Self> {
        let value = HeaderValue::from_str(value)
            .map_err(|e| Error::InvalidHeader(format!("{}: {}", name, e)))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Replace the bearer credential.
    pub fn set_bearer(&mut self, token: &str) -> Result<()> {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|e| Error::InvalidHeader(format!("authorization: {}", e)))?;
        value.set_sensitive(true);
        self.headers.insert(AUTHORIZATION, value);
        Ok(())
    }

    /// The bearer credential currently attached, if any.
    pub fn bearer_token(&self) -> Option<&str> {
        self.headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
    }

    /// Mark this request as already replayed once after a refresh.
    pub fn mark_retried(&mut self) {
        self.retried = true;
    }

    pub fn is_retried(&self) -> bool {
        self.retried
    }

    /// Whether this request targets a login or refresh endpoint.
    pub fn is_auth_endpoint(&self) -> bool {
        is_auth_endpoint(&self.path)
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> Option<&serde_json::Value> {
        self.body.as_ref()
    }

    /// Correlation id, stable across replays.
    pub fn id(&self) -> Uuid {
        self.id
    }
}

/// A fully buffered API response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl ApiResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Body as text, lossy on invalid UTF-8.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| {
            Error::Decode(format!("{} (status {})", e, self.status.as_u16()))
        })
    }

    /// Best description of a failure: the backend's `detail` field when the
    /// body is a JSON error document, otherwise the raw text.
    pub fn error_message(&self) -> String {
        if let Ok(value) = serde_json::from_slice::<serde_json::Value>(&self.body) {
            match value.get("detail") {
                Some(serde_json::Value::String(detail)) => return detail.clone(),
                Some(detail) => return detail.to_string(),
                None => {}
            }
        }
        let text = self.text();
        if text.trim().is_empty() {
            self.status
                .canonical_reason()
                .unwrap_or("Unknown error")
                .to_string()
        } else {
            text
        }
    }

    /// Turn a non-2xx response into [`Error::Api`].
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(Error::Api {
                status: self.status.as_u16(),
                message: self.error_message(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, body: &str) -> ApiResponse {
        ApiResponse::new(
            StatusCode::from_u16(status).unwrap(),
            HeaderMap::new(),
            Bytes::from(body.to_string()),
        )
    }

    #[test]
    fn test_bearer_roundtrip() {
        let mut request = ApiRequest::get("/courses");
        assert_eq!(request.bearer_token(), None);
        request.set_bearer("a1").unwrap();
        request.set_bearer("a2").unwrap();
        assert_eq!(request.bearer_token(), Some("a2"));
        assert!(request.headers().get(AUTHORIZATION).unwrap().is_sensitive());
    }

    #[test]
    fn test_invalid_bearer_is_rejected() {
        let mut request = ApiRequest::get("/courses");
        assert!(matches!(
            request.set_bearer("bad\ntoken"),
            Err(Error::InvalidHeader(_))
        ));
    }

    #[test]
    fn test_clone_keeps_id_and_retry_flag() {
        let mut request = ApiRequest::get("/courses");
        request.mark_retried();
        let replay = request.clone();
        assert_eq!(replay.id(), request.id());
        assert!(replay.is_retried());
    }

    #[test]
    fn test_auth_endpoint_detection() {
        assert!(ApiRequest::post("/auth/refresh").is_auth_endpoint());
        assert!(ApiRequest::post("/auth/dev-login").is_auth_endpoint());
        assert!(!ApiRequest::get("/auth/me").is_auth_endpoint());
    }

    #[test]
    fn test_error_message_prefers_detail() {
        assert_eq!(
            response(403, r#"{"detail":"Usuario no registrado"}"#).error_message(),
            "Usuario no registrado"
        );
        assert_eq!(response(502, "upstream down").error_message(), "upstream down");
        assert_eq!(response(404, "").error_message(), "Not Found");
    }

    #[test]
    fn test_error_for_status() {
        assert!(response(200, "[]").error_for_status().is_ok());
        let err = response(500, r#"{"detail":"boom"}"#)
            .error_for_status()
            .unwrap_err();
        assert!(matches!(err, Error::Api { status: 500, ref message } if message == "boom"));
    }

    #[test]
    fn test_json_decode_error() {
        let err = response(200, "not json").json::<Vec<i64>>().unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }
}
