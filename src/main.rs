use anyhow::Context;
use dotenvy::dotenv;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod app;
mod common;
mod config;
mod docs;
mod infrastructure;
mod modules;
mod routes;
mod state;
mod workers;

use common::temp_file::TempFileManager;
use config::settings::AppConfig;
use infrastructure::storage::ipfs::IpfsClient;
use infrastructure::transcode::ffmpeg::FfmpegTranscoder;
use modules::video::registry::JobRegistry;
use state::AppState;
use workers::encode_daemon::EncodeDaemon;
use workers::upload_daemon::UploadDaemon;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting server...");

    let config = AppConfig::new().context("Invalid configuration")?;
    let temp_files = TempFileManager::new(config.temp_dir.clone())
        .await
        .with_context(|| format!("Cannot create temp dir {}", config.temp_dir.display()))?;

    let registry = JobRegistry::new();
    let (handoff_tx, handoff_rx) = mpsc::unbounded_channel();

    let upload_daemon = Arc::new(UploadDaemon::new(
        registry.clone(),
        Arc::new(IpfsClient::new(&config.ipfs_api_url)),
    ));
    let encode_daemon = Arc::new(EncodeDaemon::new(
        registry.clone(),
        Arc::new(FfmpegTranscoder::new(
            &config.ffmpeg_path,
            &config.ffprobe_path,
            &config.encode_preset,
        )),
        handoff_tx,
    ));

    upload_daemon.spawn_handoff(handoff_rx);
    upload_daemon.start().await;
    encode_daemon.start().await;

    let port = config.server_port;
    let state = AppState::new(
        registry,
        upload_daemon.clone(),
        encode_daemon.clone(),
        temp_files,
    );
    let app = app::create_app(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("Cannot bind port {}", port))?;
    info!("Server running on http://0.0.0.0:{}", port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    encode_daemon.stop().await;
    upload_daemon.stop().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
