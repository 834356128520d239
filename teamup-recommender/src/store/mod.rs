use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use teamup_shared::errors::AppResult;

use crate::models::{ProfileChanges, ProfileRecord, UserAccount};
use crate::recommender::generator::Snapshot;

pub mod pg;

#[cfg(test)]
pub mod memory;

pub use pg::PgStore;

/// Everything the recommender reads from the relational store, plus the
/// profile write path that feeds it.
///
/// Calls are blocking; async callers go through `spawn_blocking`.
pub trait RecommendationStore: Send + Sync {
    fn ping(&self) -> AppResult<()>;

    fn get_all_user_ids(&self) -> AppResult<Vec<Uuid>>;

    /// Lowercased skill names of one user.
    fn get_user_skill_names(&self, user_id: Uuid) -> AppResult<HashSet<String>>;

    /// Lowercased interest names of one user.
    fn get_user_interest_names(&self, user_id: Uuid) -> AppResult<HashSet<String>>;

    /// Reads the whole skill/interest relation at once.
    fn snapshot(&self) -> AppResult<Snapshot> {
        let user_ids = self.get_all_user_ids()?;
        let mut skills = HashMap::with_capacity(user_ids.len());
        let mut interests = HashMap::with_capacity(user_ids.len());
        for id in &user_ids {
            skills.insert(*id, self.get_user_skill_names(*id)?);
            interests.insert(*id, self.get_user_interest_names(*id)?);
        }
        Ok(Snapshot {
            user_ids,
            skills,
            interests,
        })
    }

    /// Every user with a request row to or from `user_id`, deduplicated.
    fn get_connection_pairs(&self, user_id: Uuid) -> AppResult<Vec<Uuid>>;

    /// Whether a request row `from -> to` exists.
    fn is_requested(&self, from: Uuid, to: Uuid) -> AppResult<bool>;

    fn mutual(&self, a: Uuid, b: Uuid) -> AppResult<bool> {
        Ok(self.is_requested(a, b)? && self.is_requested(b, a)?)
    }

    /// Up to `limit` users outside `excluded`, in no particular order.
    fn get_fallback_candidates(&self, excluded: &HashSet<Uuid>, limit: usize) -> AppResult<Vec<Uuid>>;

    /// Profiles for `ids`. Ids without a profile are skipped; order is unspecified.
    fn get_profile_batch(&self, ids: &[Uuid]) -> AppResult<Vec<ProfileRecord>>;

    fn get_user_account(&self, user_id: Uuid) -> AppResult<Option<UserAccount>>;

    /// Applies an already-normalized profile write and returns the result.
    fn update_profile(&self, user_id: Uuid, changes: &ProfileChanges) -> AppResult<ProfileRecord>;
}
