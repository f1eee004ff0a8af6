//! Single-attempt HTTP transport. Reports a classified outcome; whether to
//! try again is decided by the retry controller, not here.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use super::backend::BackendDescriptor;
use super::request::WirePayload;
use super::truncate_for_error;

/// A 2xx reply with a JSON body.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub status: u16,
    pub body: Value,
}

/// Why a single attempt did not produce a `ProviderResponse`.
#[derive(Debug, Clone, Error)]
pub enum TransportFailure {
    #[error("upstream returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("network error: {message}")]
    Network { message: String, timed_out: bool },

    #[error("unreadable response body (status {status}): {message}")]
    MalformedBody { status: u16, message: String },
}

impl TransportFailure {
    /// 429, any 5xx, network errors and timeouts are worth another attempt.
    /// A 2xx whose body could not be read is treated like a dropped
    /// connection. Every other status is final.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportFailure::Status { status, .. } => is_retryable_status(*status),
            TransportFailure::Network { .. } | TransportFailure::MalformedBody { .. } => true,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            TransportFailure::Status { status, .. }
            | TransportFailure::MalformedBody { status, .. } => Some(*status),
            TransportFailure::Network { .. } => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportFailure::Network { timed_out: true, .. })
    }

    pub fn message(&self) -> &str {
        match self {
            TransportFailure::Status { message, .. }
            | TransportFailure::Network { message, .. }
            | TransportFailure::MalformedBody { message, .. } => message,
        }
    }
}

pub fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

/// One HTTP call against a backend.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        payload: &WirePayload,
        descriptor: &BackendDescriptor,
    ) -> Result<ProviderResponse, TransportFailure>;
}

#[derive(Debug, Deserialize)]
struct UpstreamError {
    error: UpstreamErrorBody,
}

#[derive(Debug, Deserialize)]
struct UpstreamErrorBody {
    message: String,
}

/// Pulls `error.message` out of an error reply, falling back to the raw body.
pub fn upstream_error_message(body: &str) -> String {
    serde_json::from_str::<UpstreamError>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| truncate_for_error(body).to_string())
}

/// `reqwest`-backed transport. The per-request timeout comes from the
/// descriptor, so one client serves every backend.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: Client::builder().build()?,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        payload: &WirePayload,
        descriptor: &BackendDescriptor,
    ) -> Result<ProviderResponse, TransportFailure> {
        let mut request = self
            .client
            .post(payload.url.clone())
            .timeout(descriptor.request_timeout);
        for (name, value) in &payload.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        // Headers go first: `json` only sets Content-Type when it is absent.
        let request = request.json(&payload.body);

        let response = request.send().await.map_err(network_failure)?;
        let status = response.status();
        let text = response.text().await.map_err(network_failure)?;

        if !status.is_success() {
            return Err(TransportFailure::Status {
                status: status.as_u16(),
                message: upstream_error_message(&text),
            });
        }

        let body = serde_json::from_str(&text).map_err(|e| TransportFailure::MalformedBody {
            status: status.as_u16(),
            message: format!("{e}: {}", truncate_for_error(&text)),
        })?;

        Ok(ProviderResponse {
            status: status.as_u16(),
            body,
        })
    }
}

fn network_failure(err: reqwest::Error) -> TransportFailure {
    TransportFailure::Network {
        timed_out: err.is_timeout(),
        message: err.to_string(),
    }
}
