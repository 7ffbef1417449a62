//! CLI entry point for the stop schedule cache.
//!
//! `run` processes the feed once; `serve` exposes the HTTP trigger a scheduler
//! calls to do the same.

use anyhow::Result;
use clap::{Parser, Subcommand};
use gtfs_stop_cache::config::{Overrides, env_var};
use gtfs_stop_cache::pipeline::{self, Pipeline, production_backends};
use gtfs_stop_cache::trigger::{self, TriggerState};
use std::ffi::OsStr;
use std::path::Path;
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "gtfs_stop_cache")]
#[command(about = "Caches today's and tomorrow's departures for one stop cluster", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the feed once and publish the schedule to the cache
    Run {
        #[command(flatten)]
        overrides: Overrides,
    },
    /// Serve the HTTP endpoint that triggers a run
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "0.0.0.0:8080")]
        bind: String,

        #[command(flatten)]
        overrides: Overrides,
    },
}

#[actix_web::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/gtfs_stop_cache.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("gtfs_stop_cache.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse().unwrap()));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse().unwrap()));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { overrides } => {
            let outcome = pipeline::run_once(env_var, &overrides, production_backends).await?;
            info!(?outcome, "Done");
        }
        Commands::Serve { bind, overrides } => {
            let pipeline = Pipeline::from_lookup(env_var, &overrides, production_backends)?;
            let cron_secret = pipeline.settings().cron_secret.clone();

            info!(bind = %bind, secret_required = cron_secret.is_some(), "Starting trigger endpoint");
            trigger::serve(TriggerState::new(pipeline, cron_secret), &bind).await?;
        }
    }

    Ok(())
}
