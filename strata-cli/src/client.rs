//! HTTP client for the daemon's control plane

use anyhow::{anyhow, Context};
use serde_json::Value;

/// Exit code for a daemon that cannot be reached
pub const EXIT_UNREACHABLE: u8 = 2;

/// Errors the CLI distinguishes for its exit codes
#[derive(Debug)]
pub enum ClientError {
    /// Connection refused or timed out: exit code 2
    Unreachable(String),
    /// Anything else: exit code 1
    Other(anyhow::Error),
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::Unreachable(message) => {
                write!(f, "daemon unreachable: {message}")
            }
            ClientError::Other(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ClientError {}

pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// Thin JSON client over the daemon's base URL
pub struct DaemonClient {
    base: String,
    http: reqwest::Client,
}

impl DaemonClient {
    #[must_use]
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            base: format!("http://{host}:{port}/api/v1"),
            http: reqwest::Client::new(),
        }
    }

    /// GET a path, expecting a JSON body
    pub async fn get(&self, path: &str) -> ClientResult<Value> {
        let url = format!("{}{}", self.base, path);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| classify(&url, e))?;
        decode(response).await
    }

    /// POST a path with an optional JSON body
    pub async fn post(&self, path: &str, body: Option<Value>) -> ClientResult<Value> {
        let url = format!("{}{}", self.base, path);
        let mut request = self.http.post(&url);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await.map_err(|e| classify(&url, e))?;
        decode(response).await
    }
}

fn classify(url: &str, e: reqwest::Error) -> ClientError {
    if e.is_connect() || e.is_timeout() {
        ClientError::Unreachable(format!("{url}: {e}"))
    } else {
        ClientError::Other(anyhow!(e).context(format!("request to {url} failed")))
    }
}

async fn decode(response: reqwest::Response) -> ClientResult<Value> {
    let status = response.status();
    let body: Value = response
        .json()
        .await
        .context("response body is not JSON")
        .map_err(ClientError::Other)?;

    if status.is_success() {
        Ok(body)
    } else {
        let message = body
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("request failed");
        Err(ClientError::Other(anyhow!("{status}: {message}")))
    }
}
