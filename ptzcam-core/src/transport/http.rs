//! Shared plumbing for the HTTP camera protocols.

use std::time::Duration;

use reqwest::{RequestBuilder, Response, StatusCode};

use crate::error::PtzError;
use crate::types::validate_host;

/// Base URL plus a pooled `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpTarget {
    client: reqwest::Client,
    base_url: String,
    credentials: Option<(String, Option<String>)>,
}

impl HttpTarget {
    /// Validate `host`/`port` and build the client. No request is sent.
    pub fn new(host: &str, port: u16) -> Result<Self, PtzError> {
        validate_host(host)?;
        if port == 0 {
            return Err(PtzError::InvalidConfig("port must be non-zero".into()));
        }
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| PtzError::InvalidConfig(format!("http client: {e}")))?;
        let host = if host.contains(':') && !host.starts_with('[') {
            format!("[{host}]")
        } else {
            host.to_string()
        };
        Ok(Self {
            client,
            base_url: format!("http://{host}:{port}"),
            credentials: None,
        })
    }

    /// Send HTTP basic auth with every request.
    pub fn with_basic_auth(mut self, username: String, password: Option<String>) -> Self {
        self.credentials = Some((username, password));
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub fn get(&self, path: &str) -> RequestBuilder {
        self.authorize(self.client.get(self.url(path)))
    }

    pub fn post(&self, path: &str) -> RequestBuilder {
        self.authorize(self.client.post(self.url(path)))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Some((user, password)) => request.basic_auth(user, password.as_deref()),
            None => request,
        }
    }
}

/// Send `request` with a deadline and turn transport and status failures
/// into [`PtzError`]s.
pub async fn send(request: RequestBuilder, timeout: Duration) -> Result<Response, PtzError> {
    let response = request
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| request_error(e, timeout))?;
    match response.status() {
        s if s.is_success() => Ok(response),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(PtzError::InvalidConfig(format!(
            "camera rejected credentials ({})",
            response.status()
        ))),
        s => Err(PtzError::Unreachable(format!(
            "{} returned {s}",
            response.url()
        ))),
    }
}

/// Read a response body as text within the same deadline.
pub async fn text(response: Response, timeout: Duration) -> Result<String, PtzError> {
    match tokio::time::timeout(timeout, response.text()).await {
        Ok(body) => body.map_err(|e| request_error(e, timeout)),
        Err(_) => Err(PtzError::Timeout(timeout)),
    }
}

/// `timeout` is the deadline the request ran under; reqwest does not
/// report it back.
fn request_error(e: reqwest::Error, timeout: Duration) -> PtzError {
    if e.is_timeout() {
        PtzError::Timeout(timeout)
    } else if e.is_decode() || e.is_body() {
        PtzError::Malformed(e.to_string())
    } else {
        PtzError::Unreachable(e.to_string())
    }
}
