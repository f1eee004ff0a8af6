use std::str::FromStr;

use anyhow::{bail, Context, Result};

use crate::analyzer::BackendDescriptor;

const DEFAULT_MAX_JOBS: usize = 200;

/// Which provider the analysis runs against. There is exactly one active
/// backend per process; it is chosen here, never inferred.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum BackendChoice {
    #[default]
    Gemini,
    Groq,
}

impl FromStr for BackendChoice {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(BackendChoice::Gemini),
            "groq" => Ok(BackendChoice::Groq),
            other => bail!("unknown analysis backend '{other}' (expected 'gemini' or 'groq')"),
        }
    }
}

/// Application configuration loaded from environment variables.
/// Keys are only checked when `descriptor()` builds the active backend.
#[derive(Clone)]
pub struct Config {
    pub backend: BackendChoice,
    pub gemini_api_key: Option<String>,
    pub groq_api_key: Option<String>,
    pub gemini_model: Option<String>,
    pub groq_model: Option<String>,
    pub gemini_endpoint: Option<String>,
    pub groq_endpoint: Option<String>,
    pub max_jobs_to_analyze: usize,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let backend = match optional_env("ANALYSIS_BACKEND") {
            Some(value) => value.parse()?,
            None => BackendChoice::default(),
        };

        Ok(Config {
            backend,
            gemini_api_key: optional_env("GEMINI_API_KEY"),
            groq_api_key: optional_env("GROQ_API_KEY"),
            gemini_model: optional_env("GEMINI_MODEL"),
            groq_model: optional_env("GROQ_MODEL"),
            gemini_endpoint: optional_env("GEMINI_ENDPOINT"),
            groq_endpoint: optional_env("GROQ_ENDPOINT"),
            max_jobs_to_analyze: optional_env("MAX_JOBS_TO_ANALYZE")
                .map(|v| v.parse::<usize>())
                .transpose()
                .context("MAX_JOBS_TO_ANALYZE must be a non-negative integer")?
                .unwrap_or(DEFAULT_MAX_JOBS),
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }

    pub fn with_backend(mut self, backend: BackendChoice) -> Self {
        self.backend = backend;
        self
    }

    /// Builds the descriptor for the selected backend.
    pub fn descriptor(&self) -> Result<BackendDescriptor> {
        let descriptor = match self.backend {
            BackendChoice::Gemini => {
                let key = self
                    .gemini_api_key
                    .clone()
                    .context("Required environment variable 'GEMINI_API_KEY' is not set")?;
                let mut d = BackendDescriptor::gemini(key);
                if let Some(model) = &self.gemini_model {
                    d = d.with_model(model);
                }
                if let Some(endpoint) = &self.gemini_endpoint {
                    d = d.with_endpoint(endpoint);
                }
                d
            }
            BackendChoice::Groq => {
                let key = self
                    .groq_api_key
                    .clone()
                    .context("Required environment variable 'GROQ_API_KEY' is not set")?;
                let mut d = BackendDescriptor::groq(key);
                if let Some(model) = &self.groq_model {
                    d = d.with_model(model);
                }
                if let Some(endpoint) = &self.groq_endpoint {
                    d = d.with_endpoint(endpoint);
                }
                d
            }
        };
        Ok(descriptor)
    }
}

/// Reads a variable, treating unset and blank the same.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
