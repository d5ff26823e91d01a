//! `reqwest`-backed JSON client

use super::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use crate::core::{ProviderError, ProviderResult};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn fetch_json(&self, request: HttpRequest) -> ProviderResult<HttpResponse> {
        let url = request.url.to_string();
        debug!("Fetching {} {}", request.method, url);

        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
        };
        let mut builder = self
            .client
            .request(method, request.url)
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| ProviderError::Transport {
            url: url.clone(),
            message: e.to_string(),
        })?;

        let status = response.status().as_u16();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = response.text().await.map_err(|e| ProviderError::Transport {
            url: url.clone(),
            message: e.to_string(),
        })?;

        if !(200..300).contains(&status) {
            return Err(ProviderError::Http { status, url });
        }

        let json = if body.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&body)
                .map_err(|e| ProviderError::Decode(format!("{}: {}", url, e)))?
        };

        Ok(HttpResponse {
            status,
            headers,
            body,
            json,
        })
    }
}
