//! Service binary for snapmd.
//!
//! Wires the real pipeline adapters to both front ends, starts the HTTP
//! listener and the Telegram connector, and stops the connector before the
//! process exits on SIGINT/SIGTERM.

use anyhow::{Context, Result};
use clap::Parser;
use snapmd::bot::{BotClient, Connector, Supervisor};
use snapmd::config::Config;
use snapmd::http::{router, AppState};
use snapmd::pipeline::normalize::JpegNormalizer;
use snapmd::pipeline::raster::PdfiumRasterizer;
use snapmd::pipeline::recognize::VisionOcr;
use snapmd::process::FilePipeline;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "snapmd", version, about = "PDF/image → Markdown OCR service")]
struct Cli {
    /// Disable the Telegram connector (HTTP front end only).
    #[arg(long, env = "SNAPMD_NO_BOT")]
    no_bot: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env().context("invalid configuration")?;
    config.ensure_work_dir().context("working directory")?;

    let pipeline = Arc::new(FilePipeline::new(
        Arc::new(PdfiumRasterizer),
        Arc::new(JpegNormalizer::default()),
        Arc::new(VisionOcr::new(
            &config.recognition_api_key,
            &config.recognition_base_url,
            &config.recognition_model,
        )),
        config.work_dir.clone(),
    ));

    // HTTP front end
    let app = router(AppState {
        pipeline: Arc::clone(&pipeline),
    });
    let addr = format!("{}:{}", config.bind, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("cannot bind {addr}"))?;
    info!("Server running on {addr}");

    // Chat front end: single connector, started after the listener is up,
    // owned by the supervisor so restarts and shutdown go through one place.
    let mut supervisor = Supervisor::default();
    if cli.no_bot {
        info!("Telegram connector disabled");
    } else {
        let client = BotClient::new(&config.bot_token, &config.telegram_base_url);
        supervisor
            .start(Connector::new(client, Arc::clone(&pipeline)))
            .await;
    }

    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());
    let result = server.await;

    // Stop the connector before exiting: halts the receive loop and clears
    // any pending retry timer.
    supervisor.stop().await;
    info!("Shutdown complete");

    result.context("HTTP server failed")
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("Received SIGINT, stopping"),
            _ = sigterm.recv() => info!("Received SIGTERM, stopping"),
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("Received Ctrl-C, stopping");
    }
}
