//! HTTP client for the TestRail API (v2)
//!
//! TestRail routes every call through `index.php?/api/v2/<endpoint>`, so the
//! endpoint path itself sits inside the query string and request parameters
//! are appended with `&`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};

use crate::config::ConnectionConfig;
use crate::error::{Error, Result};

/// Path prefix of every API endpoint, relative to the instance URL
pub const API_PREFIX: &str = "index.php?/api/v2/";

/// Read access to a TestRail-shaped JSON API
#[async_trait]
pub trait ApiClient: Send + Sync {
    /// GET an endpoint (e.g., `get_runs/1`) with extra query pairs.
    ///
    /// Non-2xx responses map to [`Error::Http`]; network failures and
    /// unreadable bodies map to [`Error::Transport`].
    async fn get(&self, path: &str, query: &[(String, String)]) -> Result<serde_json::Value>;

    /// Full URL for an endpoint, as recorded on raw rows
    fn url_for(&self, path: &str) -> String;
}

/// HTTP client for one configured TestRail connection
pub struct TestrailClient {
    http_client: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
}

impl TestrailClient {
    /// Create a new client from a connection
    ///
    /// Returns an error if the connection is invalid or missing required fields.
    pub fn new(connection: &ConnectionConfig) -> Result<Self> {
        connection.validate()?;

        let endpoint = connection
            .endpoint
            .clone()
            .ok_or_else(|| Error::Config("connections.endpoint is required".to_string()))?;
        let base_url = format!("{}/{}", endpoint.trim_end_matches('/'), API_PREFIX);
        let username = connection
            .username
            .clone()
            .ok_or_else(|| Error::Config("connections.username is required".to_string()))?;
        let password = connection
            .resolved_password()
            .ok_or_else(|| Error::Config("connections.password is required".to_string()))?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(connection.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url,
            username,
            password,
        })
    }

    /// Base URL every endpoint is appended to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ApiClient for TestrailClient {
    async fn get(&self, path: &str, query: &[(String, String)]) -> Result<serde_json::Value> {
        let url = self.url_for(path);

        tracing::debug!(url = %url, query = ?query, "GET");

        let response = self
            .http_client
            .get(&url)
            .basic_auth(&self.username, Some(&self.password))
            .query(query)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("HTTP request to {} failed: {}", url, e)))?;

        let status = response.status();

        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| Error::Transport(format!("failed to parse response from {}: {}", url, e)))
        } else {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            Err(Error::Http {
                status: status.as_u16(),
                url,
                body,
            })
        }
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}
