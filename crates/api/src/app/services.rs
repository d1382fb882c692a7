//! Service wiring: picks the storage and cache backends from configuration.

use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

use storerec_infra::AppConfig;
use storerec_infra::cache::{Cache, InMemoryCache, RedisCache};
use storerec_infra::jobs::InMemoryJobStore;
use storerec_infra::read_model::ensure_schema;
use storerec_infra::services::{AppServices, Repositories};

const MAX_DB_CONNECTIONS: u32 = 10;

/// Build the application services for `config`.
///
/// Postgres is used when `USE_PERSISTENT_STORES` is on, Redis when
/// `REDIS_URL` is set; everything else stays in process memory.
pub async fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    let repos = if config.use_persistent_stores {
        let url = config
            .database_url
            .as_deref()
            .context("DATABASE_URL is required when USE_PERSISTENT_STORES is enabled")?;
        let pool = PgPoolOptions::new()
            .max_connections(MAX_DB_CONNECTIONS)
            .connect(url)
            .await
            .context("failed to connect to Postgres")?;
        ensure_schema(&pool).await.context("failed to apply the document schema")?;
        info!("using Postgres document stores");
        Repositories::postgres(pool).context("failed to create Postgres stores")?
    } else {
        info!("using in-memory stores");
        Repositories::in_memory()
    };

    let cache: Arc<dyn Cache> = match config.redis_url.as_deref() {
        Some(url) => match RedisCache::new(url) {
            Ok(cache) => {
                info!("using Redis cache");
                Arc::new(cache)
            }
            Err(e) => {
                warn!(error = %e, "Redis cache unavailable; falling back to in-memory cache");
                Arc::new(InMemoryCache::new())
            }
        },
        None => Arc::new(InMemoryCache::new()),
    };

    Ok(AppServices::new(
        repos,
        cache,
        InMemoryJobStore::arc(),
        config.settings.clone(),
    ))
}
