use std::sync::Arc;

use teamup_recommender::config::{AppConfig, CacheBackend};
use teamup_recommender::recommender::{service, FileCache, MemoryCache, RecommendationCache, Recommender};
use teamup_recommender::store::{PgStore, RecommendationStore};
use teamup_recommender::{router, AppState};
use teamup_shared::clients::db::create_pool;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    teamup_shared::middleware::init_tracing("teamup-recommender");

    let config = AppConfig::load()?;
    let port = config.port;

    let metrics_handle = match teamup_shared::middleware::init_metrics(&[(
        service::REGENERATION_SECONDS,
        service::REGENERATION_BUCKETS,
    )]) {
        Ok(handle) => {
            service::describe_metrics();
            Some(handle)
        }
        Err(e) => {
            tracing::warn!(error = %e, "prometheus recorder not installed, /metrics will be empty");
            None
        }
    };

    let pool = create_pool(&config.database_url, config.db_pool_size)?;
    let store: Arc<dyn RecommendationStore> = Arc::new(PgStore::new(pool));

    let cache: Arc<dyn RecommendationCache> = match config.cache_backend {
        CacheBackend::File => {
            tracing::info!(path = %config.cache_path.display(), "using file recommendation cache");
            Arc::new(FileCache::new(&config.cache_path))
        }
        CacheBackend::Memory => {
            tracing::info!("using in-memory recommendation cache");
            Arc::new(MemoryCache::new())
        }
    };

    let recommender = Arc::new(Recommender::new(
        store.clone(),
        cache,
        config.freshness()?,
        config.limits(),
    ));

    let state = Arc::new(AppState {
        config,
        store,
        recommender,
        metrics_handle,
    });

    let app = router(state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, "teamup-recommender starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
