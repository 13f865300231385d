//! Authenticated HTTP access to the Notion API with bounded retries.
//!
//! The layering mirrors the LLM client in [`crate::api`]:
//! - [`ApiTransport`]: one request in, parsed JSON out
//! - [`HttpTransport`]: the `reqwest` implementation
//! - [`RetryTransport`]: decorator adding [`Backoff`] on transient failures

use crate::error::TransportError;
use crate::retry::Backoff;
use reqwest::{Client, Method as HttpMethod};
use serde_json::Value;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Patch,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Patch => "PATCH",
        })
    }
}

/// A single call against the API, relative to the configured base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
    pub query: Vec<(String, String)>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            body: None,
            query: Vec::new(),
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            body: Some(body),
            query: Vec::new(),
        }
    }

    pub fn patch(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Patch,
            path: path.into(),
            body: Some(body),
            query: Vec::new(),
        }
    }

    pub fn with_query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }
}

/// Something that can execute an [`ApiRequest`].
pub trait ApiTransport {
    async fn send(&self, request: &ApiRequest) -> Result<Value, TransportError>;
}

/// Connection settings for [`HttpTransport`].
#[derive(Clone)]
pub struct ApiSettings {
    pub base_url: String,
    pub token: String,
    pub version: String,
    pub timeout: Duration,
}

impl fmt::Debug for ApiSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiSettings")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .field("version", &self.version)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// `reqwest`-backed transport. Performs exactly one HTTP exchange per call.
pub struct HttpTransport {
    client: Client,
    base_url: String,
    token: String,
    version: String,
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

impl HttpTransport {
    pub fn new(settings: &ApiSettings) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| TransportError::Request {
                message: e.to_string(),
            })?;
        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            token: settings.token.clone(),
            version: settings.version.clone(),
        })
    }
}

/// Timeouts and connection failures are transient; builder, redirect and
/// other client-side errors are not.
fn classify_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() || e.is_connect() || e.is_request() {
        TransportError::Network {
            message: e.to_string(),
        }
    } else {
        TransportError::Request {
            message: e.to_string(),
        }
    }
}

impl ApiTransport for HttpTransport {
    #[instrument(level = "debug", skip_all, fields(method = %request.method, path = %request.path))]
    async fn send(&self, request: &ApiRequest) -> Result<Value, TransportError> {
        let method = match request.method {
            Method::Get => HttpMethod::GET,
            Method::Post => HttpMethod::POST,
            Method::Patch => HttpMethod::PATCH,
        };
        let url = format!("{}{}", self.base_url, request.path);

        let mut builder = self
            .client
            .request(method, &url)
            .bearer_auth(&self.token)
            .header("Notion-Version", &self.version);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(classify_reqwest_error)?;
        let status = response.status();
        let text = response.text().await.map_err(classify_reqwest_error)?;

        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        if text.trim().is_empty() {
            return Ok(Value::Object(Default::default()));
        }
        serde_json::from_str(&text).map_err(|e| TransportError::Decode(e.to_string()))
    }
}

/// Retries transient failures of the wrapped transport according to a [`Backoff`].
///
/// Permanent failures (most 4xx) are returned on the first occurrence. When
/// every attempt fails transiently the caller gets
/// [`TransportError::RetriesExhausted`] with the last error body.
pub struct RetryTransport<T> {
    inner: T,
    backoff: Backoff,
}

impl<T> RetryTransport<T> {
    pub fn new(inner: T, backoff: Backoff) -> Self {
        Self { inner, backoff }
    }
}

impl<T> fmt::Debug for RetryTransport<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryTransport")
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

impl<T> ApiTransport for RetryTransport<T>
where
    T: ApiTransport,
{
    #[instrument(level = "debug", skip_all, fields(method = %request.method, path = %request.path))]
    async fn send(&self, request: &ApiRequest) -> Result<Value, TransportError> {
        let total_t0 = Instant::now();
        let mut attempt = 0u32;

        loop {
            let err = match self.inner.send(request).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            if !err.is_transient() {
                debug!(error = %err, "permanent API error; not retrying");
                return Err(err);
            }

            attempt += 1;
            if attempt >= self.backoff.max_attempts {
                error!(
                    attempt,
                    max = self.backoff.max_attempts,
                    elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                    error = %err,
                    "API call exhausted retries"
                );
                return Err(TransportError::RetriesExhausted {
                    attempts: attempt,
                    last: err.diagnostic_body(),
                });
            }

            let delay = self.backoff.delay(attempt - 1);
            warn!(
                attempt,
                max = self.backoff.max_attempts,
                ?delay,
                error = %err,
                "API call failed; backing off"
            );
            sleep(delay).await;
        }
    }
}
