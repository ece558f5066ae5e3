//! B3 web control (b3-web) - Main entry point
//!
//! HTTP control service for the B3 playback binary: play/pause/stop of a
//! single player process, parameter updates, and the list of playable files.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use b3_common::config::{ConfigOverrides, ServiceConfig, TomlConfig};
use b3_common::ParamStore;
use b3_web::api::{self, AppContext};
use b3_web::process::PlayerLauncher;
use b3_web::Supervisor;
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for b3-web
#[derive(Parser, Debug)]
#[command(name = "b3-web")]
#[command(about = "HTTP control service for the B3 player")]
#[command(version)]
struct Args {
    /// TOML configuration file (default: <config dir>/b3/b3-web.toml)
    #[arg(short, long, env = "B3_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "B3_PORT")]
    port: Option<u16>,

    /// Address to bind
    #[arg(long, env = "B3_BIND")]
    bind: Option<String>,

    /// Player executable
    #[arg(long, env = "B3_PLAYER")]
    player: Option<PathBuf>,

    /// Parameter store shared with the player
    #[arg(long, env = "B3_PARAMS")]
    params: Option<PathBuf>,

    /// Directory containing playable files
    #[arg(short, long, env = "B3_AUDIO_DIR")]
    audio_dir: Option<PathBuf>,

    /// Do not pass -v to the player
    #[arg(long)]
    quiet_player: bool,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            port: self.port,
            bind: self.bind.clone(),
            player_executable: self.player.clone(),
            params_path: self.params.clone(),
            audio_dir: self.audio_dir.clone(),
            verbose_player: self.quiet_player.then_some(false),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // The TOML file may set the log level, so it is read before tracing starts
    let loaded = TomlConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    let (toml_path, toml) = match loaded {
        Some((path, toml)) => (Some(path), toml),
        None => (None, TomlConfig::default()),
    };
    let config = ServiceConfig::resolve(args.overrides(), toml).context("Invalid configuration")?;

    let default_filter = config
        .log_level
        .clone()
        .unwrap_or_else(|| "b3_web=debug,b3_common=info,tower_http=info".to_string());
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting B3 web control (b3-web) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    match &toml_path {
        Some(path) => info!("Loaded TOML configuration from {}", path.display()),
        None => warn!("No TOML configuration found, using defaults"),
    }
    info!("Parameter store: {}", config.params_path.display());
    info!("Audio folder: {}", config.audio_dir.display());

    let launcher = PlayerLauncher::new(&config.player_executable, config.verbose_player);
    info!("Player executable: {}", launcher.executable().display());
    let supervisor = Arc::new(
        Supervisor::new(
            Box::new(launcher),
            ParamStore::new(&config.params_path),
            &config.audio_dir,
            config.stop_timeout,
        )
        .await,
    );
    let monitor = supervisor.spawn_health_monitor(config.health_poll_interval);

    let app = api::build_router(AppContext {
        supervisor: Arc::clone(&supervisor),
        audio_dir: config.audio_dir.clone(),
        audio_extension: config.audio_extension.clone(),
        background_image: config.background_image.clone(),
    });

    let addr: SocketAddr = format!("{}:{}", config.bind, config.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", config.bind, config.port))?;
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    monitor.abort();
    supervisor.shutdown().await;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
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
