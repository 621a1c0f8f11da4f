//! Middleware chain in front of the HTTP transport.

use std::sync::Arc;

use async_trait::async_trait;

use super::{ApiRequest, ApiResponse, HttpTransport};
use crate::error::Result;

/// A stage in the request pipeline.
///
/// A stage may inspect or rewrite the request, call [`Next::run`] zero or
/// more times, and inspect or replace the response.
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(&self, request: ApiRequest, next: Next<'_>) -> Result<ApiResponse>;

    /// Name of this stage, for diagnostics.
    fn name(&self) -> &str {
        "unknown"
    }
}

/// The remainder of the pipeline after the current stage.
///
/// `Copy`, so a stage can run the rest of the chain again when it replays a
/// request.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    transport: &'a HttpTransport,
    middlewares: &'a [Arc<dyn Middleware>],
}

impl<'a> Next<'a> {
    pub(crate) fn new(transport: &'a HttpTransport, middlewares: &'a [Arc<dyn Middleware>]) -> Self {
        Self {
            transport,
            middlewares,
        }
    }

    /// Run the remaining stages, then the transport.
    pub async fn run(self, request: ApiRequest) -> Result<ApiResponse> {
        match self.middlewares.split_first() {
            Some((stage, rest)) => {
                stage
                    .handle(request, Next::new(self.transport, rest))
                    .await
            }
            None => self.transport.execute(request).await,
        }
    }
}

/// An ordered list of stages ending in an [`HttpTransport`].
#[derive(Clone)]
pub struct Pipeline {
    transport: Arc<HttpTransport>,
    stages: Vec<Arc<dyn Middleware>>,
}

impl Pipeline {
    pub fn new(transport: Arc<HttpTransport>) -> Self {
        Self {
            transport,
            stages: Vec::new(),
        }
    }

    /// Append a stage. Stages added first run outermost.
    pub fn with(mut self, stage: impl Middleware + 'static) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    pub fn transport(&self) -> &Arc<HttpTransport> {
        &self.transport
    }

    /// Send a request through every stage.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        Next::new(&self.transport, &self.stages).run(request).await
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stages: Vec<&str> = self.stages.iter().map(|s| s.name()).collect();
        f.debug_struct("Pipeline")
            .field("base_url", &self.transport.base_url().as_str())
            .field("stages", &stages)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use reqwest::header::HeaderName;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Records its label on the way in and tags the request.
    struct Label {
        label: &'static str,
        seen: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl Middleware for Label {
        async fn handle(&self, request: ApiRequest, next: Next<'_>) -> Result<ApiResponse> {
            self.seen.lock().unwrap().push(self.label);
            let request = request.header(HeaderName::from_static("x-stage"), self.label)?;
            next.run(request).await
        }

        fn name(&self) -> &str {
            self.label
        }
    }

    /// Sends the request twice and returns the second response.
    struct Twice;

    #[async_trait]
    impl Middleware for Twice {
        async fn handle(&self, request: ApiRequest, next: Next<'_>) -> Result<ApiResponse> {
            next.run(request.clone()).await?;
            next.run(request).await
        }
    }

    #[tokio::test]
    async fn test_stages_run_in_order() {
        let server = MockServer::start().await;
        // The inner stage writes last, so its header wins.
        Mock::given(method("GET"))
            .and(path("/courses"))
            .and(header("x-stage", "inner"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
            .expect(1)
            .mount(&server)
            .await;

        let seen = Arc::new(Mutex::new(Vec::new()));
        let transport = Arc::new(HttpTransport::new(&server.uri()).unwrap());
        let pipeline = Pipeline::new(transport)
            .with(Label { label: "outer", seen: seen.clone() })
            .with(Label { label: "inner", seen: seen.clone() });

        let response = pipeline.send(ApiRequest::get("/courses")).await.unwrap();
        assert_eq!(response.status().as_u16(), 200);
        assert_eq!(*seen.lock().unwrap(), vec!["outer", "inner"]);
    }

    #[tokio::test]
    async fn test_stage_can_rerun_remaining_chain() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/courses"))
            .respond_with(ResponseTemplate::new(200))
            .expect(2)
            .mount(&server)
            .await;

        let seen = Arc::new(Mutex::new(Vec::new()));
        let transport = Arc::new(HttpTransport::new(&server.uri()).unwrap());
        let pipeline = Pipeline::new(transport)
            .with(Twice)
            .with(Label { label: "inner", seen: seen.clone() });

        pipeline.send(ApiRequest::get("/courses")).await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["inner", "inner"]);
    }

    #[test]
    fn test_debug_lists_stages() {
        let transport = Arc::new(HttpTransport::new("http://localhost:8000").unwrap());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::new(transport).with(Label { label: "outer", seen });
        let debug = format!("{:?}", pipeline);
        assert!(debug.contains("outer"));
        assert!(debug.contains("localhost:8000"));
    }
}
