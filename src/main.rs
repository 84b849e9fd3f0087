//! CSV Aggregator
//!
//! HTTP service that joins the users, posts and comments collections into a
//! CSV file on every `GET /generate-csv`.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use csv_aggregator::{AppState, Config, OutputDir, router};

/// CLI arguments
#[derive(Parser, Debug)]
#[command(name = "csv-aggregator")]
#[command(about = "Join remote users, posts and comments into CSV files", long_about = None)]
struct Args {
    /// Path to the configuration YAML file (defaults are used when omitted)
    #[arg(short, long, env = "CSV_AGGREGATOR_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Server port
    #[arg(short, long, env = "PORT", default_value = "3000")]
    port: u16,

    /// Output directory, overrides the configuration file
    #[arg(short, long, env = "OUTPUT_DIR")]
    output_dir: Option<String>,

    /// Deployment environment; "development" adds error details to failure responses
    #[arg(long, env = "APP_ENV", default_value = "production")]
    app_env: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    // Parse CLI arguments
    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref())
        .context("Failed to load configuration")?;
    if let Some(dir) = args.output_dir {
        config.output.path = dir;
    }

    let output = OutputDir::init(&config.output.path)?;
    let development = args.app_env.eq_ignore_ascii_case("development");
    info!(
        "Environment: {}, retries: {}, retry delay: {}ms, timeout: {}s",
        args.app_env,
        config.fetch.retry.max_retries,
        config.fetch.retry.delay_ms,
        config.fetch.timeout_secs
    );

    let state = AppState::from_config(&config, output, development)?;
    let app = router(state);

    let bind_addr = format!("0.0.0.0:{}", args.port);

    // Start server
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .context(format!("Failed to bind {}", bind_addr))?;
    info!("Server running at http://localhost:{}", args.port);

    axum::serve(listener, app).await?;

    Ok(())
}
