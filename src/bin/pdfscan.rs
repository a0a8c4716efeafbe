//! HTTP server binary for edgequake-pdfscan.
//!
//! A thin shim over the library crate: maps flags and environment variables
//! to `AnalyzerConfig`, resolves the LLM provider once, and serves the router
//! until Ctrl-C / SIGTERM.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_pdfscan::server::{self, AppState};
use edgequake_pdfscan::{resolve_provider, Analyzer, AnalyzerConfig};
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Serve on the default port with gpt-4o
  OPENAI_API_KEY=sk-... pdfscan

  # Different port and model
  pdfscan --port 8080 --model gpt-4.1-mini

  # Analyse a document
  curl -X POST http://localhost:3000/api/analyze-pdf \
       -H 'Content-Type: application/json' \
       -d '{"url": "https://example.com/invoice.pdf"}'

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory)
  RUST_LOG                Log filter, overrides --verbose
"#;

/// Extract barcode and reference numbers from PDFs over HTTP.
#[derive(Parser, Debug)]
#[command(
    name = "pdfscan",
    version,
    about = "Extract barcode and reference numbers from PDFs using Vision LLMs",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Port to listen on.
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// Address to bind.
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: IpAddr,

    /// LLM model ID (e.g. gpt-4o, gpt-4.1-mini, claude-sonnet-4-20250514).
    #[arg(long, env = "GPT_MODEL", default_value = "gpt-4o")]
    model: String,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "PDFSCAN_PROVIDER")]
    provider: Option<String>,

    /// Max LLM output tokens.
    #[arg(long, env = "PDFSCAN_MAX_TOKENS", default_value_t = 16384)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "PDFSCAN_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Retries on LLM failure (0 = single attempt).
    #[arg(long, env = "PDFSCAN_MAX_RETRIES", default_value_t = 0)]
    max_retries: u32,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "PDFSCAN_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Directory for transient PDF copies and page images.
    #[arg(long, env = "PDFSCAN_TEMP_DIR")]
    temp_dir: Option<PathBuf>,

    /// Path to libpdfium (file or directory).
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib_path: Option<PathBuf>,

    /// Longest rendered page edge in pixels.
    #[arg(long, env = "PDFSCAN_MAX_PIXELS", default_value_t = 2000)]
    max_pixels: u32,

    /// Largest accepted document, in MiB.
    #[arg(long, env = "PDFSCAN_MAX_DOWNLOAD_MB", default_value_t = 50)]
    max_download_mb: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PDFSCAN_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Rasterisation timeout in seconds.
    #[arg(long, env = "PDFSCAN_RENDER_TIMEOUT", default_value_t = 120)]
    render_timeout: u64,

    /// LLM call timeout in seconds.
    #[arg(long, env = "PDFSCAN_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDFSCAN_VERBOSE")]
    verbose: bool,

    /// Emit logs as JSON lines.
    #[arg(long, env = "PDFSCAN_JSON_LOGS")]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr);
    if cli.json_logs {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    // ── Build config ─────────────────────────────────────────────────────
    let mut config = build_config(&cli).await?;

    // Resolve once so a missing API key fails at start-up, not per request.
    let provider = resolve_provider(&config).context("Failed to configure LLM provider")?;
    config.provider = Some(provider);

    tokio::fs::create_dir_all(&config.temp_dir)
        .await
        .with_context(|| format!("Failed to create temp dir {:?}", config.temp_dir))?;

    info!(
        "Model: {}  temp dir: {}",
        config.model_or_default(),
        config.temp_dir.display()
    );

    let analyzer = Analyzer::from_config(config).context("Failed to build analyzer")?;
    let state = AppState {
        analyzer: Arc::new(analyzer),
    };

    // ── Serve ────────────────────────────────────────────────────────────
    let addr = SocketAddr::new(cli.host, cli.port);
    server::serve(addr, state, shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Server stopped");
    Ok(())
}

/// Map CLI args to `AnalyzerConfig`.
async fn build_config(cli: &Cli) -> Result<AnalyzerConfig> {
    let mut builder = AnalyzerConfig::builder()
        .model(cli.model.clone())
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .max_retries(cli.max_retries)
        .max_rendered_pixels(cli.max_pixels)
        .max_download_bytes(cli.max_download_mb.saturating_mul(1024 * 1024))
        .download_timeout_secs(cli.download_timeout)
        .render_timeout_secs(cli.render_timeout)
        .api_timeout_secs(cli.api_timeout);

    if let Some(ref name) = cli.provider {
        builder = builder.provider_name(name.clone());
    }
    if let Some(ref dir) = cli.temp_dir {
        builder = builder.temp_dir(dir.clone());
    }
    if let Some(ref path) = cli.pdfium_lib_path {
        builder = builder.pdfium_lib_path(path.clone());
    }
    if let Some(ref path) = cli.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }

    builder.build().context("Invalid configuration")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
