// ============================
// crates/backend-bin/src/main.rs
// ============================
//! Tokio / Axum entry-point for the Rollcall server.
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use rollcall_backend_lib::{config::Settings, sweep::spawn_sweeper, ws_router, AppState};

/// Live meeting roster server
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Configuration file; defaults to ./config.toml when present
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn init_tracing(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.log_level));
    let (plain, json) = if settings.log_json {
        (None, Some(tracing_subscriber::fmt::layer().json()))
    } else {
        (Some(tracing_subscriber::fmt::layer()), None)
    };

    tracing_subscriber::registry().with(filter).with(plain).with(json).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let settings = Settings::load_from(args.config.as_deref())?;
    init_tracing(&settings);

    let state = Arc::new(AppState::from_settings(settings.clone())?);
    info!(accounts = settings.accounts.len(), "loaded configuration");

    let sweeper = spawn_sweeper(
        Arc::clone(&state.store),
        settings.sweep_interval(),
        settings.retention_window(),
    );
    let app = ws_router::create_router(state);

    match &settings.unix_socket {
        Some(path) => serve_unix(path, app).await?,
        None => {
            let listener = TcpListener::bind(settings.bind_addr)
                .await
                .with_context(|| format!("failed to bind {}", settings.bind_addr))?;
            info!(addr = %settings.bind_addr, "listening");
            axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
        },
    }

    sweeper.abort();
    info!("server stopped");
    Ok(())
}

#[cfg(unix)]
async fn serve_unix(path: &Path, app: axum::Router) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    use tokio::net::UnixListener;

    // a previous run may have left its socket behind
    if path.exists() {
        std::fs::remove_file(path).with_context(|| format!("failed to remove stale socket {}", path.display()))?;
    }
    let listener = UnixListener::bind(path).with_context(|| format!("failed to bind {}", path.display()))?;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o666))
        .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    info!(socket = %path.display(), "listening");

    let served = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await;
    std::fs::remove_file(path).with_context(|| format!("failed to remove socket {}", path.display()))?;
    served?;
    Ok(())
}

#[cfg(not(unix))]
async fn serve_unix(_path: &Path, _app: axum::Router) -> Result<()> {
    anyhow::bail!("unix sockets are not supported on this platform")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            },
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("shutdown signal received");
}
