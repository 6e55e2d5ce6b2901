//! Server lifecycle

use crate::config::ServerConfig;
use crate::routes::routes;
use crate::state::AppState;
use anyhow::Context;
use std::future::Future;
use std::sync::Arc;
use tracing::info;

/// Run the HTTP service until Ctrl-C
///
/// # Errors
/// Fails on invalid configuration, an unusable storage directory, or when
/// the listen address cannot be bound
pub async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    serve_with_shutdown(config, shutdown_signal()).await
}

/// Run the HTTP service until `shutdown` resolves
///
/// # Errors
/// See [`serve`]
pub async fn serve_with_shutdown(
    config: ServerConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let config = config.validate().context("invalid configuration")?;
    let state = AppState::open(config)
        .await
        .context("failed to open artifact store")?;
    let bind = state.config.bind;
    info!(
        storage_dir = %state.store.root().display(),
        public_url = %state.config.public_url,
        allowed_origin = %state.config.allowed_origin,
        header = %state.config.header,
        "starting tally server"
    );

    let (addr, server) = warp::serve(routes(Arc::new(state)))
        .try_bind_with_graceful_shutdown(bind, shutdown)
        .with_context(|| format!("failed to bind {bind}"))?;
    info!(%addr, "listening");

    server.await;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
