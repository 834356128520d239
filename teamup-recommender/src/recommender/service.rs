use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use serde::Serialize;
use uuid::Uuid;

use teamup_shared::errors::AppResult;

use crate::models::ProfileRecord;
use crate::store::RecommendationStore;

use super::cache::{FreshnessPolicy, RecommendationCache};
use super::generator::{self, GenerationStats, DEFAULT_TOP_K};

pub const REGENERATIONS_TOTAL: &str = "recommendations_regenerations_total";
pub const REGENERATION_SECONDS: &str = "recommendations_regeneration_seconds";
pub const SERVED_TOTAL: &str = "recommendations_served_total";

/// Regeneration is O(n²) in users; buckets run from small test datasets up
/// to multi-minute rebuilds.
pub const REGENERATION_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0];

/// Registers help text for the recommender's metrics with the installed recorder.
pub fn describe_metrics() {
    describe_counter!(REGENERATIONS_TOTAL, "Recommendation table rebuilds, by outcome");
    describe_histogram!(REGENERATION_SECONDS, Unit::Seconds, "Time to snapshot, score and write the recommendation table");
    describe_counter!(SERVED_TOTAL, "Recommendation lists served, by source");
}

/// Where a served list came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Ranked,
    Fallback,
}

impl Source {
    fn as_str(&self) -> &'static str {
        match self {
            Source::Ranked => "ranked",
            Source::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Served {
    pub source: Source,
    pub profiles: Vec<ProfileRecord>,
}

/// Result of the staleness check that precedes every read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refresh {
    Fresh,
    Regenerated(GenerationStats),
    Failed,
}

#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub top_k: usize,
    pub fallback_limit: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            fallback_limit: DEFAULT_TOP_K,
        }
    }
}

/// Generator, cache and store wired together.
///
/// All methods block. Regeneration is not locked; two requests that both
/// find the table stale both rebuild it, with identical results.
pub struct Recommender {
    store: Arc<dyn RecommendationStore>,
    cache: Arc<dyn RecommendationCache>,
    policy: FreshnessPolicy,
    limits: Limits,
}

impl Recommender {
    pub fn new(
        store: Arc<dyn RecommendationStore>,
        cache: Arc<dyn RecommendationCache>,
        policy: FreshnessPolicy,
        limits: Limits,
    ) -> Self {
        // Lists never exceed DEFAULT_TOP_K, whatever the caller configured.
        let limits = Limits {
            top_k: limits.top_k.clamp(1, DEFAULT_TOP_K),
            fallback_limit: limits.fallback_limit.clamp(1, DEFAULT_TOP_K),
        };
        Self {
            store,
            cache,
            policy,
            limits,
        }
    }

    pub fn policy(&self) -> FreshnessPolicy {
        self.policy
    }

    pub fn cache_written_at(&self) -> Option<DateTime<Utc>> {
        match self.cache.written_at() {
            Ok(ts) => ts,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read cache timestamp");
                None
            }
        }
    }

    /// Snapshots the store, scores every pair and replaces the cached table.
    pub fn regenerate(&self, now: DateTime<Utc>) -> anyhow::Result<GenerationStats> {
        let started = Instant::now();

        let result = (|| {
            let snapshot = self.store.snapshot()?;
            let table = generator::generate(&snapshot, self.limits.top_k);
            self.cache.replace_all(&table, now)?;
            Ok::<_, anyhow::Error>(generator::stats(&table))
        })();

        let elapsed = started.elapsed();
        histogram!(REGENERATION_SECONDS).record(elapsed.as_secs_f64());

        match &result {
            Ok(stats) => {
                counter!(REGENERATIONS_TOTAL, "outcome" => "success").increment(1);
                tracing::info!(
                    users = stats.users,
                    candidates = stats.candidates,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "recommendations regenerated"
                );
            }
            Err(e) => {
                counter!(REGENERATIONS_TOTAL, "outcome" => "failure").increment(1);
                tracing::error!(error = %e, elapsed_ms = elapsed.as_millis() as u64, "recommendation regeneration failed");
            }
        }

        result
    }

    /// Regenerates when the table is missing or stale. Failures are logged
    /// and swallowed; callers read whatever the cache still holds.
    pub fn ensure_fresh(&self, now: DateTime<Utc>) -> Refresh {
        if let Some(written_at) = self.cache_written_at() {
            if self.policy.is_fresh(written_at, now) {
                return Refresh::Fresh;
            }
            tracing::debug!(written_at = %written_at, "recommendation cache is stale");
        }

        match self.regenerate(now) {
            Ok(stats) => Refresh::Regenerated(stats),
            Err(_) => Refresh::Failed,
        }
    }

    /// The caller, plus everyone with a request row to or from the caller.
    pub fn exclusion_set(&self, user_id: Uuid) -> AppResult<HashSet<Uuid>> {
        let mut excluded: HashSet<Uuid> = self.store.get_connection_pairs(user_id)?.into_iter().collect();
        excluded.insert(user_id);
        Ok(excluded)
    }

    /// Ranked, connection-filtered, profile-enriched recommendations for one user.
    pub fn recommend_for(&self, user_id: Uuid, now: DateTime<Utc>) -> AppResult<Served> {
        self.ensure_fresh(now);

        let cached = match self.cache.get(&user_id) {
            Ok(list) => list.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "failed to read cached recommendations");
                Vec::new()
            }
        };

        let excluded = self.exclusion_set(user_id)?;
        let ranked = filter_candidates(cached, &excluded, self.limits.top_k);

        let (source, ids) = if ranked.is_empty() {
            let fallback = self
                .store
                .get_fallback_candidates(&excluded, self.limits.fallback_limit)?
                .into_iter()
                .filter(|id| !excluded.contains(id))
                .take(self.limits.fallback_limit)
                .collect::<Vec<_>>();
            (Source::Fallback, fallback)
        } else {
            (Source::Ranked, ranked)
        };

        let mut profiles = self.store.get_profile_batch(&ids)?;
        if source == Source::Ranked {
            sort_by_rank(&mut profiles, &ids);
        }

        counter!(SERVED_TOTAL, "source" => source.as_str()).increment(1);
        tracing::debug!(
            user_id = %user_id,
            source = source.as_str(),
            count = profiles.len(),
            "recommendations served"
        );

        Ok(Served { source, profiles })
    }
}

/// Drops excluded ids, keeps rank order, caps the list.
pub fn filter_candidates(candidates: Vec<Uuid>, excluded: &HashSet<Uuid>, limit: usize) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|id| !excluded.contains(id))
        .filter(|id| seen.insert(*id))
        .take(limit)
        .collect()
}

/// Reorders joined profiles to match the ranked id list.
pub fn sort_by_rank(profiles: &mut [ProfileRecord], ranked_ids: &[Uuid]) {
    let rank: HashMap<Uuid, usize> = ranked_ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();
    profiles.sort_by_key(|p| rank.get(&p.user_id).copied().unwrap_or(usize::MAX));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recommender::cache::{CacheError, CacheResult, MemoryCache};
    use crate::models::{ProfileChanges, UserAccount};
    use crate::store::memory::MemoryStore;
    use chrono::Duration;
    use teamup_shared::types::auth::UserRole;

    fn id(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    fn setup(users: u128) -> (Arc<MemoryStore>, Arc<MemoryCache>, Recommender) {
        let store = Arc::new(MemoryStore::new());
        for n in 1..=users {
            store.add_user(id(n), UserRole::User);
        }
        let cache = Arc::new(MemoryCache::new());
        let recommender = Recommender::new(
            store.clone(),
            cache.clone(),
            FreshnessPolicy::default(),
            Limits::default(),
        );
        (store, cache, recommender)
    }

    fn served_ids(served: &Served) -> Vec<Uuid> {
        served.profiles.iter().map(|p| p.user_id).collect()
    }

    #[test]
    fn serves_in_rank_order_with_profiles() {
        let (store, _, rec) = setup(4);
        store.set_skills(id(1), &["python"]);
        store.set_interests(id(1), &["ml"]);
        store.set_skills(id(2), &["python", "rust"]);
        store.set_interests(id(2), &["ml", "robotics"]);
        store.set_skills(id(3), &["go", "sql", "react"]);
        store.set_interests(id(4), &["ml"]);

        let served = rec.recommend_for(id(1), Utc::now()).unwrap();

        assert_eq!(served.source, Source::Ranked);
        // id(3): 6.0, id(2): 3.5, id(4): 1.5
        assert_eq!(served_ids(&served), vec![id(3), id(2), id(4)]);
        assert_eq!(served.profiles[1].skills, vec!["python", "rust"]);
    }

    #[test]
    fn never_serves_self() {
        let (_, _, rec) = setup(3);
        let served = rec.recommend_for(id(2), Utc::now()).unwrap();
        assert!(!served_ids(&served).contains(&id(2)));
    }

    #[test]
    fn excludes_requests_in_either_direction() {
        let (store, _, rec) = setup(5);
        store.request(id(1), id(2));
        store.request(id(3), id(1));
        store.request(id(1), id(4));
        store.request(id(4), id(1));

        let served = rec.recommend_for(id(1), Utc::now()).unwrap();
        assert_eq!(served_ids(&served), vec![id(5)]);
    }

    #[test]
    fn falls_back_when_ranked_list_is_exhausted() {
        let (store, cache, rec) = setup(4);
        // Fresh table that only knows about an already-connected user.
        let mut table = generator::Recommendations::new();
        table.insert(id(1), vec![id(2)]);
        cache.replace_all(&table, Utc::now()).unwrap();
        store.request(id(1), id(2));

        let served = rec.recommend_for(id(1), Utc::now()).unwrap();

        assert_eq!(served.source, Source::Fallback);
        let mut ids = served_ids(&served);
        ids.sort();
        assert_eq!(ids, vec![id(3), id(4)]);
    }

    #[test]
    fn empty_when_everyone_is_connected() {
        let (store, _, rec) = setup(3);
        store.request(id(1), id(2));
        store.request(id(3), id(1));

        let served = rec.recommend_for(id(1), Utc::now()).unwrap();
        assert!(served.profiles.is_empty());
        assert_eq!(served.source, Source::Fallback);
    }

    #[test]
    fn served_list_is_capped() {
        let (_, _, rec) = setup(30);
        let served = rec.recommend_for(id(1), Utc::now()).unwrap();
        assert_eq!(served.profiles.len(), DEFAULT_TOP_K);
    }

    #[test]
    fn oversized_limits_are_clamped_to_cap() {
        let store = Arc::new(MemoryStore::new());
        for n in 1..=40 {
            store.add_user(id(n), UserRole::User);
        }
        let cache = Arc::new(MemoryCache::new());
        let rec = Recommender::new(
            store.clone(),
            cache.clone(),
            FreshnessPolicy::default(),
            Limits {
                top_k: 30,
                fallback_limit: 35,
            },
        );

        let served = rec.recommend_for(id(1), Utc::now()).unwrap();
        assert_eq!(served.source, Source::Ranked);
        assert_eq!(served.profiles.len(), DEFAULT_TOP_K);
        assert_eq!(cache.get(&id(1)).unwrap().unwrap().len(), DEFAULT_TOP_K);

        // Everyone ranked is connected, so the fallback path is capped too.
        for n in 2..=40 {
            store.request(id(1), id(n));
        }
        for n in 100..=130 {
            store.add_user(id(n), UserRole::User);
        }
        let served = rec.recommend_for(id(1), Utc::now()).unwrap();
        assert_eq!(served.source, Source::Fallback);
        assert_eq!(served.profiles.len(), DEFAULT_TOP_K);
    }

    #[test]
    fn fresh_cache_is_not_regenerated() {
        let (store, _, rec) = setup(3);
        let t0 = Utc::now();

        assert!(matches!(rec.ensure_fresh(t0), Refresh::Regenerated(_)));
        assert_eq!(store.snapshot_count(), 1);

        assert_eq!(rec.ensure_fresh(t0 + Duration::seconds(599)), Refresh::Fresh);
        assert_eq!(store.snapshot_count(), 1);

        assert!(matches!(rec.ensure_fresh(t0 + Duration::seconds(601)), Refresh::Regenerated(_)));
        assert_eq!(store.snapshot_count(), 2);
    }

    #[test]
    fn regeneration_picks_up_new_data() {
        let (store, _, rec) = setup(3);
        let t0 = Utc::now();
        let first = rec.recommend_for(id(1), t0).unwrap();
        assert_eq!(served_ids(&first), vec![id(2), id(3)]);

        store.set_skills(id(3), &["cad"]);
        let still_cached = rec.recommend_for(id(1), t0 + Duration::minutes(5)).unwrap();
        assert_eq!(served_ids(&still_cached), vec![id(2), id(3)]);

        let refreshed = rec.recommend_for(id(1), t0 + Duration::minutes(11)).unwrap();
        assert_eq!(served_ids(&refreshed), vec![id(3), id(2)]);
    }

    #[test]
    fn failed_regeneration_serves_stale_table() {
        let (store, cache, rec) = setup(3);
        let long_ago = Utc::now() - Duration::hours(2);
        let mut table = generator::Recommendations::new();
        table.insert(id(1), vec![id(3), id(2)]);
        cache.replace_all(&table, long_ago).unwrap();

        // Snapshot fails, but connection and profile reads still work.
        struct SnapshotFails(Arc<MemoryStore>);
        impl RecommendationStore for SnapshotFails {
            fn ping(&self) -> AppResult<()> { self.0.ping() }
            fn get_all_user_ids(&self) -> AppResult<Vec<Uuid>> {
                Err(teamup_shared::AppError::internal("replica lag"))
            }
            fn get_user_skill_names(&self, u: Uuid) -> AppResult<HashSet<String>> { self.0.get_user_skill_names(u) }
            fn get_user_interest_names(&self, u: Uuid) -> AppResult<HashSet<String>> { self.0.get_user_interest_names(u) }
            fn get_connection_pairs(&self, u: Uuid) -> AppResult<Vec<Uuid>> { self.0.get_connection_pairs(u) }
            fn is_requested(&self, a: Uuid, b: Uuid) -> AppResult<bool> { self.0.is_requested(a, b) }
            fn get_fallback_candidates(&self, e: &HashSet<Uuid>, l: usize) -> AppResult<Vec<Uuid>> {
                self.0.get_fallback_candidates(e, l)
            }
            fn get_profile_batch(&self, ids: &[Uuid]) -> AppResult<Vec<ProfileRecord>> { self.0.get_profile_batch(ids) }
            fn get_user_account(&self, u: Uuid) -> AppResult<Option<UserAccount>> { self.0.get_user_account(u) }
            fn update_profile(&self, u: Uuid, c: &ProfileChanges) -> AppResult<ProfileRecord> {
                self.0.update_profile(u, c)
            }
        }

        let rec = Recommender::new(
            Arc::new(SnapshotFails(store)),
            cache.clone(),
            rec.policy(),
            Limits::default(),
        );

        assert_eq!(rec.ensure_fresh(Utc::now()), Refresh::Failed);
        let served = rec.recommend_for(id(1), Utc::now()).unwrap();
        assert_eq!(served.source, Source::Ranked);
        assert_eq!(served_ids(&served), vec![id(3), id(2)]);
    }

    struct WriteFails;

    impl RecommendationCache for WriteFails {
        fn get(&self, _: &Uuid) -> CacheResult<Option<Vec<Uuid>>> {
            Ok(None)
        }

        fn put(&self, _: Uuid, _: Vec<Uuid>, _: DateTime<Utc>) -> CacheResult<()> {
            Err(CacheError::Poisoned)
        }

        fn replace_all(&self, _: &generator::Recommendations, _: DateTime<Utc>) -> CacheResult<()> {
            Err(CacheError::Poisoned)
        }

        fn written_at(&self) -> CacheResult<Option<DateTime<Utc>>> {
            Ok(None)
        }
    }

    #[test]
    fn failed_regeneration_without_cache_falls_back() {
        let (store, _, _) = setup(3);
        let rec = Recommender::new(store, Arc::new(WriteFails), FreshnessPolicy::default(), Limits::default());

        let served = rec.recommend_for(id(1), Utc::now()).unwrap();
        assert_eq!(served.source, Source::Fallback);
        assert_eq!(served.profiles.len(), 2);
    }

    #[test]
    fn store_outage_is_a_server_error() {
        let (store, _, rec) = setup(3);
        store.set_unavailable(true);
        assert!(rec.recommend_for(id(1), Utc::now()).is_err());
    }

    #[test]
    fn filter_keeps_order_and_drops_duplicates() {
        let excluded: HashSet<Uuid> = [id(2)].into_iter().collect();
        let filtered = filter_candidates(vec![id(4), id(2), id(3), id(4), id(1)], &excluded, 20);
        assert_eq!(filtered, vec![id(4), id(3), id(1)]);
        assert_eq!(filter_candidates(vec![id(4), id(3), id(1)], &excluded, 2), vec![id(4), id(3)]);
    }
}
