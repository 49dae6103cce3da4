//! `pixelfleet-worker` -- paints a batch of cells through the remote
//! mutation API.
//!
//! Loads the batch file, then runs the convergence loop until the batch
//! converges, the pass budget is spent, or Ctrl-C arrives. Exits with a
//! non-zero status when the batch did not converge. Configuration is
//! documented on [`WorkerConfig::from_env`]. Send `SIGUSR1` to pause or
//! resume the workers.

use std::sync::Arc;

use anyhow::Context;
use pixelfleet_core::batch::Batch;
use pixelfleet_core::canvas::{CanvasSnapshot, SharedCanvas};
use pixelfleet_remote::api::PixelApi;
use pixelfleet_remote::chunks::ChunkLoader;
use pixelfleet_remote::token::{ChallengeSolver, HttpChallenge, StaticChallenge, TokenProvider};
use pixelfleet_worker::config::{LogFormat, TokenSource, WorkerConfig};
use pixelfleet_worker::control::{EngineControl, ToggleListener};
use pixelfleet_worker::engine::Engine;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_FILTER: &str = "pixelfleet_worker=info,pixelfleet_remote=info";

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = WorkerConfig::from_env()?;
    init_tracing(config.log_format);

    let raw = tokio::fs::read_to_string(&config.batch_file)
        .await
        .with_context(|| format!("failed to read batch file {}", config.batch_file.display()))?;
    let batch = Batch::from_json(&raw)
        .with_context(|| format!("invalid batch file {}", config.batch_file.display()))?;

    tracing::info!(
        api_url = %config.api_url,
        items = batch.len(),
        parallelism = config.engine.parallelism.get(),
        max_passes = config.engine.max_passes,
        "Starting pixelfleet-worker",
    );

    let api = PixelApi::new(config.api_url.as_str());
    let solver: Arc<dyn ChallengeSolver> = match &config.token_source {
        TokenSource::Static(token) => Arc::new(StaticChallenge::new(token.as_str())),
        TokenSource::Challenge(url) => Arc::new(HttpChallenge::new(url.as_str())),
    };
    let tokens = TokenProvider::new(solver).with_attempt_timeout(config.token_timeout);
    let canvas = SharedCanvas::new(CanvasSnapshot::new());
    let control = Arc::new(EngineControl::new());

    let mut engine = Engine::new(
        Arc::new(api.clone()),
        Arc::new(canvas.clone()),
        Arc::new(tokens),
        Arc::clone(&control),
        config.engine.clone(),
    );
    if config.refresh_canvas {
        engine = engine.with_refresher(Arc::new(ChunkLoader::new(api, canvas)));
    }

    let listener = ToggleListener::spawn(control);

    let converged = tokio::select! {
        summary = engine.run(&batch) => {
            tracing::info!(
                passes = summary.passes,
                converged = summary.converged,
                accepted = summary.accepted,
                "Run finished",
            );
            summary.converged
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted, stopping run");
            false
        }
    };

    listener.shutdown().await;

    if !converged {
        tracing::error!("Batch did not converge");
        std::process::exit(1);
    }
    Ok(())
}
