//! CLI binary for pathway-recon.
//!
//! Reads configuration from flags, the environment and `.env`, then serves
//! the dashboard until Ctrl-C.

use anyhow::{Context, Result};
use clap::Parser;
use pathway_recon::{serve, ReconstructionConfig, ServerConfig};
use std::io;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"ENVIRONMENT:
  GOOGLE_API_KEY         Gemini API key (required for analyses)
  PATHWAY_MODEL          Gemini model id (default: gemini-2.5-flash)
  PATHWAY_API_BASE_URL   Override the Gemini REST endpoint
  PATHWAY_DOT_BINARY     Graphviz `dot` executable (default: dot on PATH)
  PDFIUM_LIB_PATH        Directory or file of the pdfium shared library
  RUST_LOG               Log filter, e.g. pathway_recon=debug

A `.env` file in the working directory is read on startup.

EXAMPLES:
  pathway-recon
  pathway-recon --host 0.0.0.0 --port 8080
  GOOGLE_API_KEY=AIza... pathway-recon -v
"#;

/// Reconstruct metabolic pathways from scientific PDFs.
#[derive(Parser, Debug)]
#[command(
    name = "pathway-recon",
    version,
    about = "Dashboard that reconstructs metabolic pathways from scientific PDFs with Gemini",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Interface to bind.
    #[arg(long, env = "PATHWAY_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port to bind.
    #[arg(short, long, env = "PATHWAY_PORT", default_value_t = 8501)]
    port: u16,

    /// Gemini model id. Overrides PATHWAY_MODEL.
    #[arg(long)]
    model: Option<String>,

    /// Idle session lifetime in seconds.
    #[arg(long, env = "PATHWAY_SESSION_TTL", default_value_t = 7200)]
    session_ttl: u64,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PATHWAY_VERBOSE")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Configuration ────────────────────────────────────────────────────
    let mut config =
        ReconstructionConfig::from_env().context("Invalid configuration in environment")?;
    if let Some(model) = cli.model {
        config.model = model;
    }

    let server = ServerConfig {
        host: cli.host,
        port: cli.port,
        session_ttl_secs: cli.session_ttl,
    };

    serve(server, config).await.context("Dashboard server failed")?;
    Ok(())
}
