/**
 * PCWATCH KERNEL - entry point
 *
 * ROLE: load config (fail-fast), wire store + remediation gateway into the
 * HTTP router, serve until Ctrl+C.
 */

use anyhow::{Context, Result};
use pcwatch_kernel::config::{config_path, load_config};
use pcwatch_kernel::http::{build_router, AppState};
use pcwatch_kernel::remediation::{ProcessExecutor, RemediationGateway};
use pcwatch_kernel::store::StateStore;
use std::sync::Arc;
use time::UtcOffset;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // must be read while the process is still single-threaded
    let utc_offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?
        .block_on(run(utc_offset))
}

async fn run(utc_offset: UtcOffset) -> Result<()> {
    // .env is optional
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("pcwatch_kernel=info,tower_http=info")),
        )
        .init();

    // no config, no server
    let path = config_path();
    let cfg = load_config(&path)
        .await
        .with_context(|| format!("could not load configuration from {}", path.display()))?;
    info!(config = %path.display(), data_dir = %cfg.data_directory.display(), %utc_offset, "configuration loaded");

    let executor = ProcessExecutor::new(cfg.remediation_command()?, cfg.remediation_timeout());
    info!(timeout_secs = executor.timeout().as_secs(), "remediation gateway ready");

    let app_state = AppState {
        store: StateStore::new(cfg.status_path(), cfg.history_path()),
        gateway: RemediationGateway::new(Arc::new(executor)),
        config: Some(Arc::new(cfg.clone())),
        utc_offset,
    };
    let app = build_router(app_state);

    let addr = cfg.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}
