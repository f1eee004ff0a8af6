//! CV analysis core — the single point of entry for LLM calls in this crate.
//!
//! Pipeline per call, strictly sequential:
//! `request::build` → `Transport::send` under `retry::retry_with_backoff`
//! → `extract::extract` → `normalize::normalize`.
//!
//! The backend is chosen by the caller through a `BackendDescriptor`; this
//! module never reads the process environment.

use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use uuid::Uuid;

pub mod backend;
pub mod extract;
pub mod models;
pub mod normalize;
pub mod prompts;
pub mod request;
pub mod retry;
pub mod transport;

pub use backend::{AuthStyle, BackendDescriptor, BackendKind};
pub use models::{
    AnalysisRequest, AnalysisResult, CvAnalysis, Filters, Job, JobMatch, MatchLocation,
};
pub use retry::RetryPolicy;
pub use transport::{HttpTransport, ProviderResponse, Transport, TransportFailure};

/// Longest raw text carried inside an error, in bytes.
const ERROR_TEXT_LIMIT: usize = 500;

#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Missing credential, empty résumé text, or an unusable descriptor.
    /// Raised before any network call.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Retries exhausted, or a non-retryable HTTP status. `timed_out` is set
    /// when the last attempt hit the backend's request timeout.
    #[error(
        "Transport error after {attempts} attempt(s) (status {}): {message}",
        .status.map_or_else(|| "none".to_string(), |s| s.to_string())
    )]
    Transport {
        status: Option<u16>,
        message: String,
        attempts: u32,
        timed_out: bool,
    },

    /// The provider's text could not be reduced to a JSON object.
    #[error("Parse error: {reason}; raw output: {raw}")]
    Parse { reason: String, raw: String },

    /// The JSON object lacks a required field or has the wrong shape.
    #[error("Validation error at {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("Analysis cancelled")]
    Cancelled,
}

impl AnalysisError {
    /// Whether the caller can fix this by changing its input or setup.
    pub fn is_client_fixable(&self) -> bool {
        matches!(
            self,
            AnalysisError::Configuration(_) | AnalysisError::Validation { .. }
        )
    }

    /// A short message suitable for end users.
    pub fn user_message(&self) -> String {
        match self {
            AnalysisError::Configuration(msg) => {
                format!("The analysis is not set up correctly: {msg}.")
            }
            AnalysisError::Validation { field, .. } => format!(
                "The analysis came back incomplete (missing or invalid '{field}'). \
                 Please check your input and try again."
            ),
            AnalysisError::Transport {
                status, timed_out, ..
            } => match (status, timed_out) {
                (Some(status), _) => {
                    format!("Error analyzing CV (status {status}). Please try again later.")
                }
                (None, true) => "Error analyzing CV: the AI service took too long to respond. \
                                 Please try again later."
                    .to_string(),
                (None, false) => "Error analyzing CV: the AI service could not be reached. \
                                  Please try again later."
                    .to_string(),
            },
            AnalysisError::Parse { .. } => {
                "Could not parse the analysis from the AI. Please try again later.".to_string()
            }
            AnalysisError::Cancelled => "The analysis was cancelled.".to_string(),
        }
    }
}

/// Truncates at a char boundary for inclusion in errors and logs.
pub(crate) fn truncate_for_error(text: &str) -> &str {
    if text.len() <= ERROR_TEXT_LIMIT {
        return text;
    }
    let mut end = ERROR_TEXT_LIMIT;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Runs analyses against whichever backend the caller describes.
///
/// Cheap to clone and safe to share across tasks; holds no per-call state.
#[derive(Clone)]
pub struct Analyzer {
    transport: Arc<dyn Transport>,
    retry: RetryPolicy,
}

impl Analyzer {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Compares `request.resume_text` against `request.jobs` using `descriptor`.
    pub async fn analyze(
        &self,
        request: &AnalysisRequest,
        descriptor: &BackendDescriptor,
    ) -> Result<AnalysisResult, AnalysisError> {
        self.analyze_with_cancel(request, descriptor, &CancellationToken::new())
            .await
    }

    /// Like `analyze`, but aborts the in-flight call or backoff sleep when
    /// `cancel` fires.
    pub async fn analyze_with_cancel(
        &self,
        request: &AnalysisRequest,
        descriptor: &BackendDescriptor,
        cancel: &CancellationToken,
    ) -> Result<AnalysisResult, AnalysisError> {
        let analysis_id = Uuid::new_v4();
        info!(
            %analysis_id,
            backend = %descriptor.name,
            model = %descriptor.model,
            jobs = request.jobs.len(),
            "Starting CV analysis"
        );

        match self.run(request, descriptor, cancel, analysis_id).await {
            Ok(result) => {
                info!(
                    %analysis_id,
                    matches = result.job_matches.len(),
                    "CV analysis complete"
                );
                Ok(result)
            }
            Err(e) => {
                error!(%analysis_id, "CV analysis failed: {e}");
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        request: &AnalysisRequest,
        descriptor: &BackendDescriptor,
        cancel: &CancellationToken,
        analysis_id: Uuid,
    ) -> Result<AnalysisResult, AnalysisError> {
        let payload = request::build(request, descriptor)?;
        let transport = self.transport.as_ref();
        let max_attempts = self.retry.max_attempts;

        let response = retry::retry_with_backoff(self.retry, cancel, |attempt| {
            info!(
                %analysis_id,
                "Attempt {}/{}: calling {} at {}",
                attempt + 1,
                max_attempts,
                descriptor.name,
                payload.redacted_url()
            );
            transport.send(&payload, descriptor)
        })
        .await?;

        descriptor.kind.log_usage(&response.body);

        let text = descriptor
            .kind
            .response_text(&response.body)
            .ok_or_else(|| AnalysisError::Parse {
                reason: "the response was empty or malformed".to_string(),
                raw: truncate_for_error(&response.body.to_string()).to_string(),
            })?;

        let parsed = extract::extract(text)?;
        let mut result = normalize::normalize(parsed)?;
        result.job_matches = normalize::retain_submitted(result.job_matches, &request.jobs);
        Ok(result)
    }
}
