//! Fake REST backend
//!
//! Serves a [`Dataset`] over HTTP in the simple-REST dialect so the REST
//! provider has something real to talk to. Latency and random failures can be
//! injected to exercise the resilient layers.

pub mod routes;

pub use routes::{route, ListQuery, RestReply};

use crate::data::Dataset;
use anyhow::{Context, Result};
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::{self, HeaderValue};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use reqwest::Url;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct FakeServerConfig {
    /// Address to bind to; port 0 picks a free port
    pub listen_addr: SocketAddr,
    /// Delay added before every response
    pub latency: Duration,
    /// Probability in `[0, 1]` that a request is answered with 503
    pub failure_rate: f64,
}

impl Default for FakeServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 4000)),
            latency: Duration::ZERO,
            failure_rate: 0.0,
        }
    }
}

impl FakeServerConfig {
    /// Loopback on an ephemeral port, for tests
    pub fn ephemeral() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            ..Default::default()
        }
    }
}

struct ServerState {
    dataset: Arc<Dataset>,
    latency: Duration,
    failure_rate: f64,
    requests: Arc<AtomicU64>,
}

pub struct FakeRestServer {
    config: FakeServerConfig,
    dataset: Arc<Dataset>,
}

impl FakeRestServer {
    pub fn new(config: FakeServerConfig, dataset: Arc<Dataset>) -> Self {
        Self { config, dataset }
    }

    pub fn dataset(&self) -> &Arc<Dataset> {
        &self.dataset
    }

    /// Bind and serve in a background task
    pub async fn start(self) -> Result<RunningServer> {
        let listener = TcpListener::bind(self.config.listen_addr)
            .await
            .with_context(|| format!("Failed to bind fake REST server to {}", self.config.listen_addr))?;
        let local_addr = listener
            .local_addr()
            .context("Failed to read fake REST server address")?;

        info!("Fake REST server listening on http://{}", local_addr);

        let requests = Arc::new(AtomicU64::new(0));
        let state = Arc::new(ServerState {
            dataset: self.dataset,
            latency: self.config.latency,
            failure_rate: self.config.failure_rate.clamp(0.0, 1.0),
            requests: requests.clone(),
        });
        let task = tokio::spawn(accept_loop(listener, state));

        Ok(RunningServer {
            local_addr,
            requests,
            task,
        })
    }

    /// Serve on the current task until the runtime shuts down
    pub async fn serve(self) -> Result<()> {
        let running = self.start().await?;
        running.task.await.context("Fake REST server task failed")
    }
}

async fn accept_loop(listener: TcpListener, state: Arc<ServerState>) {
    loop {
        let (stream, remote_addr) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                error!("Failed to accept connection: {}", e);
                continue;
            }
        };

        let state = state.clone();
        tokio::spawn(async move {
            let io = TokioIo::new(stream);
            let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                let state = state.clone();
                async move { handle_request(req, state).await }
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                debug!("Connection error from {}: {}", remote_addr, err);
            }
        });
    }
}

async fn handle_request(
    req: Request<hyper::body::Incoming>,
    state: Arc<ServerState>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    state.requests.fetch_add(1, Ordering::Relaxed);

    if !state.latency.is_zero() {
        tokio::time::sleep(state.latency).await;
    }

    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = req.uri().query().map(str::to_string);

    if method == Method::OPTIONS {
        let mut response = json_response(StatusCode::NO_CONTENT, Bytes::new());
        let headers = response.headers_mut();
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("GET, POST, PUT, DELETE, OPTIONS"),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Content-Type, Accept"),
        );
        return Ok(response);
    }

    if state.failure_rate > 0.0 && rand::random::<f64>() < state.failure_rate {
        warn!("Injected failure for {} {}", method, path);
        return Ok(json_response(
            StatusCode::SERVICE_UNAVAILABLE,
            Bytes::from_static(br#"{"error":"injected failure"}"#),
        ));
    }

    let body = req.into_body().collect().await?.to_bytes();
    let reply = route(&state.dataset, &method, &path, query.as_deref(), &body);
    if reply.status.is_client_error() {
        debug!("{} {} -> {}", method, path, reply.status);
    }

    let mut response = json_response(reply.status, Bytes::from(reply.body.to_string()));
    if let Some(range) = reply.content_range {
        match HeaderValue::from_str(&range) {
            Ok(value) => {
                response.headers_mut().insert(header::CONTENT_RANGE, value);
            }
            Err(e) => warn!("Dropping unencodable Content-Range '{}': {}", range, e),
        }
    }
    Ok(response)
}

fn json_response(status: StatusCode, body: Bytes) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_EXPOSE_HEADERS,
        HeaderValue::from_static("Content-Range"),
    );
    response
}

/// Handle to a server started with [`FakeRestServer::start`]
///
/// Dropping the handle leaves the server running; call [`shutdown`](Self::shutdown) to stop it.
#[derive(Debug)]
pub struct RunningServer {
    local_addr: SocketAddr,
    requests: Arc<AtomicU64>,
    task: JoinHandle<()>,
}

impl RunningServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn base_url(&self) -> Result<Url> {
        Url::parse(&format!("http://{}", self.local_addr))
            .with_context(|| format!("Invalid server address {}", self.local_addr))
    }

    /// Requests received so far, including injected failures
    pub fn requests_served(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    pub fn shutdown(self) {
        info!("Stopping fake REST server on {}", self.local_addr);
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FakeServerConfig::default();
        assert_eq!(config.listen_addr.port(), 4000);
        assert_eq!(config.failure_rate, 0.0);
        assert_eq!(config.latency, Duration::ZERO);
    }

    #[test]
    fn test_json_response_headers() {
        let response = json_response(StatusCode::OK, Bytes::from_static(b"[]"));
        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_EXPOSE_HEADERS),
            Some(&HeaderValue::from_static("Content-Range"))
        );
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE),
            Some(&HeaderValue::from_static("application/json"))
        );
    }

    #[tokio::test]
    async fn test_start_binds_ephemeral_port() {
        let dataset = Arc::new(Dataset::new());
        let server = FakeRestServer::new(FakeServerConfig::ephemeral(), dataset)
            .start()
            .await
            .unwrap();
        assert_ne!(server.local_addr().port(), 0);
        assert_eq!(
            server.base_url().unwrap().as_str(),
            format!("http://{}/", server.local_addr())
        );
        server.shutdown();
    }
}
