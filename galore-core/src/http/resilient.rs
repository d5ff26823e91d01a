//! Failure-tracking HTTP client
//!
//! Wraps an [`HttpClient`] with a per-request deadline and the same key state
//! machine as the provider wrapper, keyed by `<url>-<METHOD>`. Errors are
//! recorded and propagated; once a key is permanently failed, the client stops
//! hitting the network for it and answers with a synthesized 200 response
//! built from the fallback records named by the URL path.

use super::{HttpClient, HttpRequest, HttpResponse};
use crate::core::{ProviderError, ProviderResult, Record, RecordId};
use crate::data::FallbackData;
use crate::resilience::ResilienceState;
use crate::resolver::LogThrottle;
use async_trait::async_trait;
use reqwest::Url;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct ResilientHttpClient<C> {
    inner: C,
    timeout: Duration,
    state: Arc<ResilienceState>,
    fallback: Arc<FallbackData>,
    bypass_log: LogThrottle,
}

impl<C: HttpClient> ResilientHttpClient<C> {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

    pub fn new(inner: C) -> Self {
        Self {
            inner,
            timeout: Self::DEFAULT_TIMEOUT,
            state: Arc::new(ResilienceState::default()),
            fallback: FallbackData::shared(),
            bypass_log: LogThrottle::default(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.state = Arc::new(ResilienceState::new(max_retries));
        self
    }

    pub fn with_state(mut self, state: Arc<ResilienceState>) -> Self {
        self.state = state;
        self
    }

    pub fn with_fallback(mut self, fallback: Arc<FallbackData>) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn state(&self) -> &Arc<ResilienceState> {
        &self.state
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    /// Rate limit of the "serving fallback" lines, one per key per window
    pub fn bypass_log(&self) -> &LogThrottle {
        &self.bypass_log
    }

    /// Fallback response for a URL: always a JSON array, with a matching `Content-Range`
    pub fn fallback_response(&self, url: &Url) -> HttpResponse {
        let (resource, id) = path_target(url);
        let records: Vec<Record> = match &id {
            Some(id) => vec![self.fallback.find(&resource, id)],
            None => self.fallback.records(&resource).to_vec(),
        };

        let count = records.len();
        let range = if count == 0 {
            format!("{} 0-0/0", resource)
        } else {
            format!("{} 0-{}/{}", resource, count - 1, count)
        };
        let body = Value::Array(records.into_iter().map(Record::into_value).collect());

        HttpResponse::synthesized(body).with_header("content-range", range)
    }
}

/// First path segment is the resource, the second (if any) the record id
fn path_target(url: &Url) -> (String, Option<RecordId>) {
    let mut segments = url
        .path_segments()
        .into_iter()
        .flatten()
        .filter(|segment| !segment.is_empty());
    let resource = segments.next().unwrap_or_default().to_string();
    let id = segments.next().map(RecordId::parse);
    (resource, id)
}

#[async_trait]
impl<C: HttpClient> HttpClient for ResilientHttpClient<C> {
    async fn fetch_json(&self, request: HttpRequest) -> ProviderResult<HttpResponse> {
        let key = request.key();

        if self.state.should_bypass(&key) {
            if self.bypass_log.should_log(&key) {
                info!("Using fallback data for {} after repeated failures", request.url);
            }
            return Ok(self.fallback_response(&request.url));
        }

        let url = request.url.to_string();
        let outcome = match tokio::time::timeout(self.timeout, self.inner.fetch_json(request)).await
        {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout {
                operation: format!("request to {}", url),
                elapsed: self.timeout,
            }),
        };

        match outcome {
            Ok(response) => {
                debug!("Response from {}: status {}", url, response.status);
                self.state.record_success(&key);
                Ok(response)
            }
            Err(error) => {
                warn!("Error fetching {}: {}", url, error);
                self.state.record_failure(&key);
                Err(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::KeyState;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Counts requests; fails, hangs or answers `[]` on demand
    #[derive(Default)]
    struct StubClient {
        failing: AtomicBool,
        hanging: AtomicBool,
        requests: AtomicUsize,
        last_url: Mutex<Option<String>>,
    }

    #[async_trait]
    impl HttpClient for StubClient {
        async fn fetch_json(&self, request: HttpRequest) -> ProviderResult<HttpResponse> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            *self.last_url.lock() = Some(request.url.to_string());
            if self.hanging.load(Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
            if self.failing.load(Ordering::SeqCst) {
                return Err(ProviderError::Transport {
                    url: request.url.to_string(),
                    message: "connection refused".into(),
                });
            }
            Ok(HttpResponse::synthesized(json!([])))
        }
    }

    fn url(path: &str) -> Url {
        Url::parse("http://localhost:4000").unwrap().join(path).unwrap()
    }

    #[tokio::test]
    async fn test_errors_propagate_until_budget_is_spent() {
        let stub = Arc::new(StubClient::default());
        stub.failing.store(true, Ordering::SeqCst);
        let client = ResilientHttpClient::new(stub.clone());
        let request = HttpRequest::get(url("/customers/3"));

        assert!(client.fetch_json(request.clone()).await.is_err());
        assert!(client.fetch_json(request.clone()).await.is_err());
        assert_eq!(
            client.state().state(&request.key()),
            KeyState::PermanentlyFailed { failures: 2 }
        );

        let response = client.fetch_json(request.clone()).await.unwrap();
        assert_eq!(stub.requests.load(Ordering::SeqCst), 2);
        assert_eq!(response.status, 200);
        assert_eq!(response.json[0]["first_name"], json!("Customer 3"));

        // Repeated bypasses of the same key log once per window
        for _ in 0..3 {
            client.fetch_json(request.clone()).await.unwrap();
        }
        assert_eq!(client.bypass_log().suppressed(), 3);
    }

    #[tokio::test]
    async fn test_success_clears_failures() {
        let stub = Arc::new(StubClient::default());
        stub.failing.store(true, Ordering::SeqCst);
        let client = ResilientHttpClient::new(stub.clone());
        let request = HttpRequest::get(url("/orders"));

        assert!(client.fetch_json(request.clone()).await.is_err());
        stub.failing.store(false, Ordering::SeqCst);
        client.fetch_json(request.clone()).await.unwrap();
        assert_eq!(client.state().state(&request.key()), KeyState::Fresh);
    }

    #[tokio::test]
    async fn test_methods_are_tracked_separately() {
        let stub = Arc::new(StubClient::default());
        stub.failing.store(true, Ordering::SeqCst);
        let client = ResilientHttpClient::new(stub.clone()).with_max_retries(0);

        let _ = client.fetch_json(HttpRequest::delete(url("/reviews/1"))).await;
        let _ = client.fetch_json(HttpRequest::get(url("/reviews/1"))).await;
        assert_eq!(stub.requests.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_request_times_out() {
        let stub = Arc::new(StubClient::default());
        stub.hanging.store(true, Ordering::SeqCst);
        let client = ResilientHttpClient::new(stub);

        let err = client
            .fetch_json(HttpRequest::get(url("/products")))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProviderError::Timeout { elapsed, .. } if elapsed == Duration::from_secs(2)
        ));
    }

    #[test]
    fn test_fallback_response_shapes() {
        let client = ResilientHttpClient::new(StubClient::default());

        let list = client.fallback_response(&url("/orders?range=[0,9]"));
        assert_eq!(list.json.as_array().map(Vec::len), Some(5));
        assert_eq!(list.header("content-range"), Some("orders 0-4/5"));

        let stub = client.fallback_response(&url("/categories/7"));
        assert_eq!(stub.json, json!([{ "id": 7 }]));

        let text_id = client.fallback_response(&url("/customers/abc"));
        assert_eq!(text_id.json, json!([{ "id": "abc" }]));

        let empty = client.fallback_response(&url("/categories"));
        assert_eq!(empty.json, json!([]));
        assert_eq!(empty.header("content-range"), Some("categories 0-0/0"));
    }
}
