use anyhow::{Context, Result};
use asr_gateway::{load_model, logging, serve, AppState, CliOverrides, Config};
use clap::Parser;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// How long running sessions get to flush their final results on shutdown
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Streaming speech-recognition gateway
#[derive(Parser, Debug)]
#[command(name = "asr-gateway")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (TOML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<String>,

    #[command(flatten)]
    overrides: CliOverrides,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let cfg = Config::load(cli.config.as_deref(), &cli.overrides)?;
    logging::init(cfg.log.level.as_deref());

    info!("ASR gateway v{}", env!("CARGO_PKG_VERSION"));
    info!("Loading model from: {}", cfg.recognizer.model_path);
    let model = load_model(&cfg.recognizer).context("Failed to load recognition model")?;

    let state = AppState::from_config(&cfg, model);
    info!(
        "Recognition pool: {} workers, default sample rate {} Hz",
        state.dispatcher.workers(),
        cfg.recognizer.sample_rate
    );

    let addr = cfg.bind_addr();
    info!("Starting server on {}", addr);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    let shutdown = state.shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown requested");
                shutdown.cancel();
            }
            Err(e) => warn!("Failed to listen for shutdown signal: {}", e),
        }
    });

    serve(listener, state.clone()).await?;

    state.sessions.close();
    if tokio::time::timeout(SHUTDOWN_GRACE, state.sessions.wait())
        .await
        .is_err()
    {
        warn!(
            "{} sessions still running after {:?}, exiting",
            state.active_sessions(),
            SHUTDOWN_GRACE
        );
    }

    info!("Server stopped ({} sessions served)", state.total_sessions());

    Ok(())
}
