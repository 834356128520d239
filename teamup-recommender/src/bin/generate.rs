//! One-shot regeneration of the recommendation table, for cron or deploy hooks.
//!
//! Always rebuilds, regardless of the cache's age. Exits non-zero on failure.

use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;

use teamup_recommender::config::{AppConfig, CacheBackend};
use teamup_recommender::recommender::{FileCache, Recommender};
use teamup_recommender::store::PgStore;
use teamup_shared::clients::db::create_pool;

fn main() -> anyhow::Result<()> {
    teamup_shared::middleware::init_tracing("teamup-generate");

    let config = AppConfig::load().context("loading configuration")?;
    if config.cache_backend == CacheBackend::Memory {
        anyhow::bail!("cache_backend=memory is process-local; the batch generator needs the file backend");
    }

    let pool = create_pool(&config.database_url, 2).context("connecting to database")?;
    let recommender = Recommender::new(
        Arc::new(PgStore::new(pool)),
        Arc::new(FileCache::new(&config.cache_path)),
        config.freshness()?,
        config.limits(),
    );

    let stats = recommender
        .regenerate(Utc::now())
        .context("regenerating recommendations")?;

    tracing::info!(
        users = stats.users,
        lists = stats.lists,
        candidates = stats.candidates,
        path = %config.cache_path.display(),
        "recommendation table written"
    );
    Ok(())
}
