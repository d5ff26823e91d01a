//! HTTP plumbing between the REST provider and the backend
//!
//! - [`HttpClient`]: the JSON fetch seam (`fetch_json`)
//! - [`client::ReqwestClient`]: real client over `reqwest`
//! - [`resilient::ResilientHttpClient`]: per-URL timeout, failure tracking and
//!   synthesized fallback responses

pub mod client;
pub mod resilient;

pub use client::ReqwestClient;
pub use resilient::ResilientHttpClient;

use crate::core::ProviderResult;
use async_trait::async_trait;
use reqwest::Url;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: Url,
    pub body: Option<Value>,
}

impl HttpRequest {
    pub fn get(url: Url) -> Self {
        Self {
            method: HttpMethod::Get,
            url,
            body: None,
        }
    }

    pub fn post(url: Url, body: Value) -> Self {
        Self {
            method: HttpMethod::Post,
            url,
            body: Some(body),
        }
    }

    pub fn put(url: Url, body: Value) -> Self {
        Self {
            method: HttpMethod::Put,
            url,
            body: Some(body),
        }
    }

    pub fn delete(url: Url) -> Self {
        Self {
            method: HttpMethod::Delete,
            url,
            body: None,
        }
    }

    /// Failure-tracking key: `<url>-<METHOD>`
    pub fn key(&self) -> String {
        format!("{}-{}", self.url, self.method)
    }
}

/// Status, headers (lower-cased names), raw body and parsed JSON
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
    pub json: Value,
}

impl HttpResponse {
    /// A 200 JSON response built locally, never sent over the wire
    pub fn synthesized(json: Value) -> Self {
        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), "application/json".to_string());
        Self {
            status: 200,
            headers,
            body: json.to_string(),
            json,
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Send `request` and parse a JSON body; non-2xx statuses are errors
    async fn fetch_json(&self, request: HttpRequest) -> ProviderResult<HttpResponse>;
}

#[async_trait]
impl<C: HttpClient + ?Sized> HttpClient for std::sync::Arc<C> {
    async fn fetch_json(&self, request: HttpRequest) -> ProviderResult<HttpResponse> {
        (**self).fetch_json(request).await
    }
}
