//! Request construction: turns an `AnalysisRequest` into the exact URL,
//! headers and JSON body a backend expects. Pure; performs no I/O.

use std::fmt;

use reqwest::Url;
use serde::Serialize;
use serde_json::Value;

use super::backend::{AuthStyle, BackendDescriptor, BackendKind};
use super::models::AnalysisRequest;
use super::prompts::{response_schema, system_prompt, user_prompt};
use super::AnalysisError;

/// A fully built HTTP request, ready for a `Transport`.
#[derive(Clone)]
pub struct WirePayload {
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

impl WirePayload {
    /// The URL with any `key` query parameter masked, for logs.
    pub fn redacted_url(&self) -> String {
        let mut url = self.url.clone();
        let pairs: Vec<(String, String)> = self
            .url
            .query_pairs()
            .map(|(k, v)| {
                let v = if k == "key" { "REDACTED".to_string() } else { v.into_owned() };
                (k.into_owned(), v)
            })
            .collect();
        if !pairs.is_empty() {
            url.query_pairs_mut().clear().extend_pairs(pairs);
        }
        url.to_string()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Debug for WirePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header_names: Vec<&str> = self.headers.iter().map(|(k, _)| k.as_str()).collect();
        f.debug_struct("WirePayload")
            .field("url", &self.redacted_url())
            .field("headers", &header_names)
            .finish_non_exhaustive()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Wire bodies
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatCompletionsBody<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentBody<'a> {
    contents: Vec<Content<'a>>,
    system_instruction: Content<'a>,
    generation_config: GenerationConfig<'a>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    response_mime_type: &'a str,
    response_schema: Value,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
    max_output_tokens: u32,
}

// ────────────────────────────────────────────────────────────────────────────
// Builder
// ────────────────────────────────────────────────────────────────────────────

/// Builds the wire request for `descriptor`.
///
/// Fails with `AnalysisError::Configuration` when the résumé text or the
/// credential is empty, or the endpoint is not a valid URL.
pub fn build(
    request: &AnalysisRequest,
    descriptor: &BackendDescriptor,
) -> Result<WirePayload, AnalysisError> {
    if request.resume_text.trim().is_empty() {
        return Err(AnalysisError::Configuration(
            "résumé text is empty".to_string(),
        ));
    }
    if !descriptor.has_credential() {
        return Err(AnalysisError::Configuration(format!(
            "no API key configured for backend '{}'",
            descriptor.name
        )));
    }

    let jobs_json = serde_json::to_string(&request.jobs).map_err(|e| {
        AnalysisError::Configuration(format!("failed to serialize job list: {e}"))
    })?;
    let filters_json = serde_json::to_string(&request.filters).map_err(|e| {
        AnalysisError::Configuration(format!("failed to serialize filters: {e}"))
    })?;

    let system = system_prompt(descriptor.kind);
    let user = user_prompt(descriptor.kind, &request.resume_text, &jobs_json, &filters_json);

    let body = match descriptor.kind {
        BackendKind::ChatCompletions => serde_json::to_value(ChatCompletionsBody {
            model: &descriptor.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &system,
                },
                ChatMessage {
                    role: "user",
                    content: &user,
                },
            ],
            temperature: descriptor.temperature,
            max_tokens: descriptor.max_output_tokens,
            response_format: ResponseFormat {
                format_type: "json_object",
            },
        }),
        BackendKind::GenerateContent => serde_json::to_value(GenerateContentBody {
            contents: vec![Content {
                parts: vec![Part { text: &user }],
            }],
            system_instruction: Content {
                parts: vec![Part { text: &system }],
            },
            generation_config: GenerationConfig {
                response_mime_type: &descriptor.response_mime_type,
                response_schema: response_schema(),
                temperature: descriptor.temperature,
                top_p: descriptor.top_p,
                top_k: descriptor.top_k,
                max_output_tokens: descriptor.max_output_tokens,
            },
        }),
    }
    .map_err(|e| AnalysisError::Configuration(format!("failed to serialize request body: {e}")))?;

    let endpoint = descriptor.resolved_endpoint();

    let mut headers = vec![("Content-Type".to_string(), "application/json".to_string())];
    let url = match descriptor.auth_style {
        AuthStyle::BearerHeader => {
            headers.push((
                "Authorization".to_string(),
                format!("Bearer {}", descriptor.api_key()),
            ));
            Url::parse(&endpoint).map_err(|e| invalid_endpoint(&endpoint, e))?
        }
        AuthStyle::QueryParamKey => {
            Url::parse_with_params(&endpoint, &[("key", descriptor.api_key())])
                .map_err(|e| invalid_endpoint(&endpoint, e))?
        }
    };

    Ok(WirePayload { url, headers, body })
}

fn invalid_endpoint(endpoint: &str, err: impl fmt::Display) -> AnalysisError {
    AnalysisError::Configuration(format!("invalid endpoint '{endpoint}': {err}"))
}
