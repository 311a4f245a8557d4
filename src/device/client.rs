//! Device API client
//!
//! Every call is a single request to `http://{host}/cgi-bin/api/{endpoint}`
//! with a hard timeout and no retries. Logging is left to callers.

use async_trait::async_trait;
use reqwest::{header, Client};
use std::time::Duration;
use tracing::warn;

use super::DeviceError;

pub const CONTENT_TYPE_FORM: &str = "application/x-www-form-urlencoded";
pub const CONTENT_TYPE_TEXT: &str = "text/plain";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

const USER_AGENT: &str = concat!("av-controls/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// One call against a device's control API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRequest {
    pub method: Method,
    /// IPv4 address, optionally with `:port`
    pub host: String,
    pub endpoint: String,
    pub body: Option<String>,
    pub content_type: &'static str,
    pub timeout: Duration,
}

impl DeviceRequest {
    pub fn get(host: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            host: host.into(),
            endpoint: endpoint.into(),
            body: None,
            content_type: CONTENT_TYPE_FORM,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn post(
        host: impl Into<String>,
        endpoint: impl Into<String>,
        body: impl Into<String>,
        content_type: &'static str,
    ) -> Self {
        Self {
            method: Method::Post,
            host: host.into(),
            endpoint: endpoint.into(),
            body: Some(body.into()),
            content_type,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// POST with a `text/plain` body, the shape every device command uses
    pub fn post_text(host: impl Into<String>, endpoint: impl Into<String>, body: impl Into<String>) -> Self {
        Self::post(host, endpoint, body, CONTENT_TYPE_TEXT)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn url(&self) -> String {
        format!("http://{}/cgi-bin/api/{}", self.host, self.endpoint)
    }
}

/// Sends device requests and returns the raw reply body
#[async_trait]
pub trait DeviceTransport: Send + Sync {
    async fn send(&self, request: DeviceRequest) -> Result<String, DeviceError>;
}

/// reqwest-backed transport used in production
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap_or_else(|e| {
                warn!("Failed to build HTTP client with custom config: {}. Using default.", e);
                Client::default()
            });
        Self { client }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeviceTransport for HttpTransport {
    async fn send(&self, request: DeviceRequest) -> Result<String, DeviceError> {
        let url = request.url();
        let mut builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
        }
        .timeout(request.timeout);

        if let Some(body) = request.body {
            builder = builder
                .header(header::CONTENT_TYPE, request.content_type)
                .body(body);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                DeviceError::transport(format!(
                    "Request to {} timed out after {}s",
                    url,
                    request.timeout.as_secs_f32()
                ))
            } else {
                DeviceError::transport(e.to_string())
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| DeviceError::transport(e.to_string()))?;

        if status.as_u16() >= 400 {
            return Err(DeviceError::Http {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}
