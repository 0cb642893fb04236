//! Good Boy simulator - HTTP stand-in for the pet-feeder firmware

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use goodboy_sim::api::{self, ApiState};
use goodboy_sim::config::SimConfig;
use goodboy_sim::device::{DeviceHandle, LogKind};

/// Simulated Good Boy pet feeder
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (built-in defaults when omitted)
    #[arg(short, long, env = "GOODBOY_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Also write logs to a daily rolling file in this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Seed the random generators for a reproducible run
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Keep the guard alive so buffered file logs are flushed on exit
    let _log_guard = init_logging(&args.log_level, args.log_dir.as_deref())?;

    info!("Starting Good Boy simulator...");

    let mut config = match &args.config {
        Some(path) => {
            info!("Configuration file: {}", path.display());
            SimConfig::load(path).await?
        }
        None => {
            info!("No configuration file given, using defaults");
            SimConfig::default()
        }
    };

    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    config.validate()?;

    if let Some(seed) = config.seed {
        info!(seed, "Using fixed RNG seed");
    }

    let device = DeviceHandle::spawn(config.device_parts());
    device.log(LogKind::Ok, config.startup_message());
    let state = Arc::new(ApiState {
        device: device.clone(),
        preview: config.motor_preview(),
    });

    api::start_server(state, &config.server, shutdown_signal()).await?;

    device.shutdown();
    info!("Good Boy simulator shutdown complete");
    Ok(())
}

fn init_logging(level: &str, log_dir: Option<&std::path::Path>) -> Result<Option<WorkerGuard>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "goodboy-sim.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(writer)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .with(file_layer)
        .init();

    if let Some(dir) = log_dir {
        info!("Writing logs to {}", dir.display());
    }

    Ok(guard)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
        // Without a signal handler the server runs until killed
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
