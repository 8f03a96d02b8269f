// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! HTTP transport layer.
//!
//! [`FeedTransport`] is the seam between the typed [`crate::FeedClient`] and
//! the network. The production implementation is [`ReqwestTransport`]; tests
//! substitute canned responses.

use std::future::Future;
use std::time::Duration;

use log::{debug, warn};

use crate::protocol::FeedError;

/// Default feed endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.adsb.lol";

const USER_AGENT: &str = concat!("flightwatch/", env!("CARGO_PKG_VERSION"));

/// Configuration for the HTTP transport.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Base URL without trailing slash, e.g. `https://api.adsb.lol`.
    pub base_url: String,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Raw request/response transport used by the feed client.
///
/// Paths are relative to the feed's base URL and always start with `/`.
pub trait FeedTransport: Send + Sync {
    /// Perform a GET request and return the response body.
    fn get(&self, path: &str) -> impl Future<Output = Result<String, FeedError>> + Send;

    /// Perform a POST request with a JSON body and return the response body.
    fn post_json(
        &self,
        path: &str,
        body: String,
    ) -> impl Future<Output = Result<String, FeedError>> + Send;
}

/// Transport backed by an async `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: String,
}

impl ReqwestTransport {
    /// Build a transport from the given configuration.
    pub fn new(config: &FeedConfig) -> Result<Self, FeedError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| FeedError::Http(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, request: reqwest::RequestBuilder, path: &str) -> Result<String, FeedError> {
        let response = request.send().await.map_err(|e| {
            warn!("Request to {} failed: {}", path, e);
            FeedError::Http(e.to_string())
        })?;

        let status = response.status();
        debug!("{} -> {}", path, status);
        if !status.is_success() {
            return Err(FeedError::Status {
                status: status.as_u16(),
                path: path.to_string(),
            });
        }

        response
            .text()
            .await
            .map_err(|e| FeedError::Http(format!("failed to read response body: {e}")))
    }
}

impl FeedTransport for ReqwestTransport {
    async fn get(&self, path: &str) -> Result<String, FeedError> {
        let request = self.client.get(self.url(path));
        self.send(request, path).await
    }

    async fn post_json(&self, path: &str, body: String) -> Result<String, FeedError> {
        let request = self
            .client
            .post(self.url(path))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body);
        self.send(request, path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let transport = ReqwestTransport::new(&FeedConfig {
            base_url: "https://feed.example/".to_string(),
            ..FeedConfig::default()
        })
        .unwrap();
        assert_eq!(transport.url("/v2/mil"), "https://feed.example/v2/mil");
    }
}
