//! Entry point for the portfolio-server binary.

use clap::Parser;
use portfolio_server::{
    AppState, Application,
    config::ServerConfig,
    reload::spawn_watcher,
};
use portfolio_store::StoreCell;
use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Process-wide record store, opened on first use.
static STORE: StoreCell = StoreCell::new();

/// HTTP backend for the portfolio site.
#[derive(Debug, Parser)]
#[command(name = "portfolio-server", version, about)]
struct Args {
    /// Run in development mode (hot reload, KV browser, memory fallback).
    #[arg(long)]
    dev: bool,

    /// Port to listen on; overrides PORT.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load configuration
    let mut config = ServerConfig::from_env()?;
    if args.dev {
        config.dev_mode = true;
    }
    if let Some(port) = args.port {
        config.port = port;
    }

    init_tracing(&config.log_level);

    tracing::info!("Starting portfolio-server");
    tracing::info!(
        port = config.port,
        environment = config.environment(),
        content_dir = %config.content_dir.display(),
        "Configuration loaded"
    );

    let store = STORE.get_or_open(&config.store_config()).await?;
    tracing::info!(backend = store.backend_kind().as_str(), "Store ready");

    let state = AppState::new(store, config.clone());
    if state.notifier().is_none() {
        tracing::warn!("Telegram credentials not configured, notifications disabled");
    }

    // Kept alive for the lifetime of the server
    let _watcher = if config.dev_mode {
        match spawn_watcher(&config.content_dir, state.reload().clone()) {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                tracing::warn!(error = %e, "Hot reload watcher unavailable");
                None
            }
        }
    } else {
        None
    };

    let app = Application::new(state).into_router();

    let addr = config.socket_addr();
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Initialize the tracing subscriber.
fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
