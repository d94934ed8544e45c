//! Fusion service (emo-fusion) - Main entry point
//!
//! Serves one-shot multimodal analysis and the real-time WebSocket channel
//! on top of the facial, voice and text analyzer services.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use emo_common::config::{load_config, TomlConfig};
use emo_fusion::analyzer::HttpAnalyzerClient;
use emo_fusion::config::FusionSettings;
use emo_fusion::logging::init_tracing;
use emo_fusion::{build_router, AppState};
use tokio::signal;
use tracing::info;

const SERVICE_NAME: &str = "fusion";

/// Command-line arguments for emo-fusion
#[derive(Parser, Debug)]
#[command(name = "emo-fusion")]
#[command(about = "Multimodal emotion fusion service")]
#[command(version)]
struct Args {
    /// Config file (default: <config dir>/emo/fusion.toml)
    #[arg(short, long, env = "EMO_FUSION_CONFIG")]
    config: Option<PathBuf>,

    /// Interface to bind
    #[arg(long, env = "EMO_FUSION_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "EMO_FUSION_PORT")]
    port: Option<u16>,

    /// Facial analyzer base URL
    #[arg(long)]
    facial_url: Option<String>,

    /// Voice analyzer base URL
    #[arg(long)]
    voice_url: Option<String>,

    /// Text analyzer base URL
    #[arg(long)]
    text_url: Option<String>,
}

impl Args {
    /// Command-line values take precedence over everything loaded
    fn apply_to(&self, config: &mut TomlConfig) {
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(url) = &self.facial_url {
            config.analyzers.facial_url = url.clone();
        }
        if let Some(url) = &self.voice_url {
            config.analyzers.voice_url = url.clone();
        }
        if let Some(url) = &self.text_url {
            config.analyzers.text_url = url.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let loaded = load_config(args.config.as_deref(), SERVICE_NAME)
        .context("Failed to load configuration")?;
    let mut config = loaded.config.clone();
    args.apply_to(&mut config);

    let _log_guard = init_tracing(&config.logging)?;

    let settings = FusionSettings::from_toml(&config).context("Invalid configuration")?;

    info!("Starting emo-fusion v{}", env!("CARGO_PKG_VERSION"));
    loaded.log_resolution();
    info!("Facial analyzer: {}", settings.endpoints.facial_url);
    info!("Voice analyzer: {}", settings.endpoints.voice_url);
    info!("Text analyzer: {}", settings.endpoints.text_url);
    info!(
        "Timeouts: batch {:?}, frame {:?}, audio {:?}, text {:?}",
        settings.batch_timeout,
        settings.realtime.frame_timeout,
        settings.realtime.audio_timeout,
        settings.realtime.text_timeout
    );

    let analyzer = HttpAnalyzerClient::new(settings.endpoints.clone())
        .context("Failed to build analyzer HTTP client")?;

    let state = AppState::new(Arc::new(analyzer), &settings);
    let app = build_router(state);

    info!("Starting HTTP server on {}", settings.bind_addr);

    let listener = tokio::net::TcpListener::bind(settings.bind_addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
