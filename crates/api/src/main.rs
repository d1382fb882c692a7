use std::sync::Arc;

use anyhow::Context;

use storerec_api::app::{build_app, services::build_services};
use storerec_infra::{AppConfig, workers};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    storerec_observability::init();

    let config = AppConfig::from_env();
    if config.admin_token == storerec_infra::config::DEFAULT_ADMIN_TOKEN {
        tracing::warn!("ADMIN_TOKEN not set; using insecure dev default");
    }

    let services = Arc::new(build_services(&config).await?);
    let workers = workers::start(services.clone(), &config.workers).context("failed to start background workers")?;

    let app = build_app(services, config.admin_token.as_str());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    if let Some(workers) = workers {
        tokio::task::spawn_blocking(move || workers.shutdown()).await?;
    }
    tracing::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}
