//! Backend descriptors — immutable per-provider configuration.
//!
//! The two supported providers share the whole analysis pipeline and differ
//! only in request shape, auth placement, and where the model text lives in
//! the reply. `BackendKind` selects that strategy pair.

use std::fmt;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

pub const GROQ_ENDPOINT: &str = "https://api.groq.com/openai/v1/chat/completions";
pub const GROQ_MODEL: &str = "llama-3.1-70b-versatile";
const GROQ_TIMEOUT_SECS: u64 = 60;
const GROQ_MAX_TOKENS: u32 = 8192;

pub const GEMINI_ENDPOINT: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/{model}:generateContent";
pub const GEMINI_MODEL: &str = "gemini-2.5-flash";
/// Large structured outputs take a while on this backend.
const GEMINI_TIMEOUT_SECS: u64 = 180;
const GEMINI_MAX_OUTPUT_TOKENS: u32 = 65_536;
const GEMINI_TOP_P: f64 = 0.95;
const GEMINI_TOP_K: u32 = 64;

const TEMPERATURE: f64 = 0.2;
const JSON_MIME_TYPE: &str = "application/json";

/// Request/response shape of a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// OpenAI-compatible chat completions (Groq).
    ChatCompletions,
    /// Gemini `generateContent` with a declared response schema.
    GenerateContent,
}

/// Where the credential goes on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStyle {
    /// `Authorization: Bearer <key>`
    BearerHeader,
    /// `?key=<key>` on the endpoint URL
    QueryParamKey,
}

impl BackendKind {
    /// JSON pointer to the model's text inside a successful reply.
    pub fn response_pointer(self) -> &'static str {
        match self {
            BackendKind::ChatCompletions => "/choices/0/message/content",
            BackendKind::GenerateContent => "/candidates/0/content/parts/0/text",
        }
    }

    /// Extracts the model text from a reply body, if present and non-empty.
    pub fn response_text(self, body: &Value) -> Option<&str> {
        body.pointer(self.response_pointer())
            .and_then(Value::as_str)
            .filter(|text| !text.trim().is_empty())
    }

    /// Whether the provider accepts a formal output schema.
    pub fn supports_response_schema(self) -> bool {
        matches!(self, BackendKind::GenerateContent)
    }

    /// Logs token usage and flags replies that did not finish normally.
    pub fn log_usage(self, body: &Value) {
        let (usage, finish_reason) = match self {
            BackendKind::ChatCompletions => (
                body.get("usage").map(|u| {
                    (
                        u.get("prompt_tokens").and_then(Value::as_u64),
                        u.get("completion_tokens").and_then(Value::as_u64),
                    )
                }),
                body.pointer("/choices/0/finish_reason")
                    .and_then(Value::as_str),
            ),
            BackendKind::GenerateContent => (
                body.get("usageMetadata").map(|u| {
                    (
                        u.get("promptTokenCount").and_then(Value::as_u64),
                        u.get("candidatesTokenCount").and_then(Value::as_u64),
                    )
                }),
                body.pointer("/candidates/0/finishReason")
                    .and_then(Value::as_str),
            ),
        };

        if let Some((input, output)) = usage {
            debug!(
                "LLM call usage: input_tokens={}, output_tokens={}",
                input.unwrap_or_default(),
                output.unwrap_or_default()
            );
        }

        if let Some(reason) = finish_reason {
            if !reason.eq_ignore_ascii_case("stop") {
                warn!("LLM reply finished with reason {reason}; output may be truncated");
            }
        }
    }
}

/// Immutable description of one provider: where to call, how to
/// authenticate, and the generation parameters to send.
#[derive(Clone)]
pub struct BackendDescriptor {
    pub name: String,
    pub kind: BackendKind,
    /// May contain a `{model}` placeholder.
    pub endpoint: String,
    pub model: String,
    pub auth_style: AuthStyle,
    api_key: String,
    pub request_timeout: Duration,
    pub max_output_tokens: u32,
    pub response_mime_type: String,
    pub temperature: f64,
    pub top_p: Option<f64>,
    pub top_k: Option<u32>,
}

impl BackendDescriptor {
    /// Groq-hosted chat completions with bearer auth.
    pub fn groq(api_key: impl Into<String>) -> Self {
        Self {
            name: "groq".to_string(),
            kind: BackendKind::ChatCompletions,
            endpoint: GROQ_ENDPOINT.to_string(),
            model: GROQ_MODEL.to_string(),
            auth_style: AuthStyle::BearerHeader,
            api_key: api_key.into(),
            request_timeout: Duration::from_secs(GROQ_TIMEOUT_SECS),
            max_output_tokens: GROQ_MAX_TOKENS,
            response_mime_type: JSON_MIME_TYPE.to_string(),
            temperature: TEMPERATURE,
            top_p: None,
            top_k: None,
        }
    }

    /// Gemini `generateContent` with the key in the query string.
    pub fn gemini(api_key: impl Into<String>) -> Self {
        Self {
            name: "gemini".to_string(),
            kind: BackendKind::GenerateContent,
            endpoint: GEMINI_ENDPOINT.to_string(),
            model: GEMINI_MODEL.to_string(),
            auth_style: AuthStyle::QueryParamKey,
            api_key: api_key.into(),
            request_timeout: Duration::from_secs(GEMINI_TIMEOUT_SECS),
            max_output_tokens: GEMINI_MAX_OUTPUT_TOKENS,
            response_mime_type: JSON_MIME_TYPE.to_string(),
            temperature: TEMPERATURE,
            top_p: Some(GEMINI_TOP_P),
            top_k: Some(GEMINI_TOP_K),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn has_credential(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    /// The endpoint with `{model}` substituted. Carries no credential.
    pub fn resolved_endpoint(&self) -> String {
        self.endpoint.replace("{model}", &self.model)
    }
}

impl fmt::Debug for BackendDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("auth_style", &self.auth_style)
            .field("api_key", &if self.has_credential() { "<redacted>" } else { "<empty>" })
            .field("request_timeout", &self.request_timeout)
            .field("max_output_tokens", &self.max_output_tokens)
            .finish_non_exhaustive()
    }
}
