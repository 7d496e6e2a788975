use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use shared::{
    error::ApiError,
    protocol::{
        BuildGraphRequest, BuildGraphResponse, ParallelDijkstraRequest, ParallelDijkstraResponse,
        PathQuery, PathResponse, RunAllotmentRequest, RunAllotmentResponse, BUILD_GRAPH_PATH,
        EXPORT_DIAGNOSTICS_PATH, GET_PATH_PATH, PARALLEL_DIJKSTRA_PATH, RUN_ALLOTMENT_PATH,
    },
};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("backend reported an error: {0}")]
    Application(String),
    #[error("transport failure: {0}")]
    Transport(String),
}

pub type BackendResult<T> = Result<T, BackendError>;

#[async_trait]
pub trait BackendClient: Send + Sync {
    async fn build_graph(&self, request: &BuildGraphRequest) -> BackendResult<BuildGraphResponse>;
    async fn run_allotment(
        &self,
        request: &RunAllotmentRequest,
    ) -> BackendResult<RunAllotmentResponse>;
    async fn get_path(&self, query: PathQuery) -> BackendResult<PathResponse>;
    /// Opaque diagnostic report.
    async fn export_diagnostics(&self) -> BackendResult<Value>;
    async fn run_parallel_dijkstra(
        &self,
        request: &ParallelDijkstraRequest,
    ) -> BackendResult<ParallelDijkstraResponse>;
}

pub struct HttpBackendClient {
    http: Client,
    server_url: String,
}

impl HttpBackendClient {
    pub fn new(server_url: &Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            server_url: server_url.as_str().trim_end_matches('/').to_string(),
        })
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.server_url, path)
    }

    async fn post_json<Req, Resp>(&self, path: &str, body: &Req) -> BackendResult<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        debug!(path, "POST backend request");
        let response = self
            .http
            .post(self.endpoint(path))
            .json(body)
            .send()
            .await
            .map_err(|err| transport(path, err))?;
        decode_enveloped(path, read_json(path, response).await?)
    }
}

#[async_trait]
impl BackendClient for HttpBackendClient {
    async fn build_graph(&self, request: &BuildGraphRequest) -> BackendResult<BuildGraphResponse> {
        self.post_json(BUILD_GRAPH_PATH, request).await
    }

    async fn run_allotment(
        &self,
        request: &RunAllotmentRequest,
    ) -> BackendResult<RunAllotmentResponse> {
        self.post_json(RUN_ALLOTMENT_PATH, request).await
    }

    async fn get_path(&self, query: PathQuery) -> BackendResult<PathResponse> {
        debug!(path = GET_PATH_PATH, "GET backend request");
        let response = self
            .http
            .get(self.endpoint(GET_PATH_PATH))
            .query(&query)
            .send()
            .await
            .map_err(|err| transport(GET_PATH_PATH, err))?;
        decode_enveloped(GET_PATH_PATH, read_json(GET_PATH_PATH, response).await?)
    }

    async fn export_diagnostics(&self) -> BackendResult<Value> {
        debug!(path = EXPORT_DIAGNOSTICS_PATH, "GET backend request");
        let response = self
            .http
            .get(self.endpoint(EXPORT_DIAGNOSTICS_PATH))
            .send()
            .await
            .map_err(|err| transport(EXPORT_DIAGNOSTICS_PATH, err))?;
        let body = read_json(EXPORT_DIAGNOSTICS_PATH, response).await?;
        if body.get("status").and_then(Value::as_str) == Some("error") {
            return Err(application_error(EXPORT_DIAGNOSTICS_PATH, body));
        }
        Ok(body)
    }

    async fn run_parallel_dijkstra(
        &self,
        request: &ParallelDijkstraRequest,
    ) -> BackendResult<ParallelDijkstraResponse> {
        self.post_json(PARALLEL_DIJKSTRA_PATH, request).await
    }
}

fn transport(path: &str, err: reqwest::Error) -> BackendError {
    warn!(path, error = %err, "backend request failed");
    BackendError::Transport(format!("{path}: {err}"))
}

async fn read_json(path: &str, response: Response) -> BackendResult<Value> {
    let status = response.status();
    if !status.is_success() {
        warn!(path, %status, "backend returned non-success HTTP status");
        return Err(BackendError::Transport(format!("{path}: HTTP {status}")));
    }
    response.json::<Value>().await.map_err(|err| {
        warn!(path, error = %err, "backend returned a malformed body");
        BackendError::Transport(format!("{path}: malformed response body: {err}"))
    })
}

// A success body of the wrong shape is a transport failure.
pub(crate) fn decode_enveloped<T: DeserializeOwned>(path: &str, body: Value) -> BackendResult<T> {
    match body.get("status").and_then(Value::as_str) {
        Some("success") => serde_json::from_value(body).map_err(|err| {
            warn!(path, error = %err, "backend success body did not match the contract");
            BackendError::Transport(format!("{path}: malformed response body: {err}"))
        }),
        Some("error") => Err(application_error(path, body)),
        other => {
            warn!(path, status = ?other, "backend response has no usable status field");
            Err(BackendError::Transport(format!(
                "{path}: response is missing the status discriminator"
            )))
        }
    }
}

fn application_error(path: &str, body: Value) -> BackendError {
    let message = serde_json::from_value::<ApiError>(body)
        .map(|err| err.message)
        .unwrap_or_default();
    let message = if message.is_empty() {
        "Unknown error".to_string()
    } else {
        message
    };
    warn!(path, %message, "backend reported an application error");
    BackendError::Application(message)
}

#[cfg(test)]
#[path = "tests/backend_tests.rs"]
mod tests;
