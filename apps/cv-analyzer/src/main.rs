use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cv_analyzer::analyzer::{AnalysisRequest, Analyzer, Filters, HttpTransport, Job};
use cv_analyzer::config::{BackendChoice, Config};
use cv_analyzer::intake::{select_jobs, AnalysisReport};

#[derive(Parser)]
#[command(name = "cv-analyzer")]
#[command(about = "Score job postings against a résumé with an LLM backend")]
struct Cli {
    /// Plain-text résumé
    #[arg(long)]
    resume: PathBuf,

    /// JSON array of job postings
    #[arg(long)]
    jobs: PathBuf,

    /// JSON object of filters (e.g. {"type": "Full-time"})
    #[arg(long)]
    filters: Option<PathBuf>,

    /// Overrides ANALYSIS_BACKEND
    #[arg(long, value_enum)]
    backend: Option<BackendChoice>,

    /// Overrides MAX_JOBS_TO_ANALYZE
    #[arg(long)]
    max_jobs: Option<usize>,

    /// Pretty-print the JSON report
    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration first
    let mut config = Config::from_env()?;
    if let Some(backend) = cli.backend {
        config = config.with_backend(backend);
    }

    // Initialize structured logging; stdout is reserved for the report
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("cv_analyzer={}", &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting CV analyzer v{}", env!("CARGO_PKG_VERSION"));

    let descriptor = config.descriptor()?;
    info!(
        "Backend: {} (model: {}, API key present: {})",
        descriptor.name,
        descriptor.model,
        descriptor.has_credential()
    );

    let resume_text = tokio::fs::read_to_string(&cli.resume)
        .await
        .with_context(|| format!("Failed to read résumé from {}", cli.resume.display()))?;
    if resume_text.trim().is_empty() {
        bail!("Could not extract text from {}", cli.resume.display());
    }

    let jobs: Vec<Job> = read_json(&cli.jobs).await.context("Invalid jobs format")?;
    let filters: Filters = match &cli.filters {
        Some(path) => read_json(path).await.context("Invalid filters format")?,
        None => Filters::default(),
    };

    let max_jobs = cli.max_jobs.unwrap_or(config.max_jobs_to_analyze);
    let selection = select_jobs(jobs, &filters, max_jobs);
    if selection.jobs.is_empty() {
        warn!("No jobs left after filtering; only the CV analysis will be meaningful");
    }

    let transport = HttpTransport::new().context("Failed to build HTTP client")?;
    let analyzer = Analyzer::new(Arc::new(transport));
    let request = AnalysisRequest::new(resume_text, selection.jobs.clone(), filters);

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling analysis");
            on_ctrl_c.cancel();
        }
    });

    let result = match analyzer
        .analyze_with_cancel(&request, &descriptor, &cancel)
        .await
    {
        Ok(result) => result,
        Err(e) => {
            error!("Analysis error: {e}");
            bail!(e.user_message());
        }
    };

    let report = AnalysisReport::new(result, &selection);
    let output = if cli.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{output}");

    Ok(())
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
}
