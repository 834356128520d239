use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Weight of each skill the candidate has and the user lacks.
pub const W_UNIQUE_SKILL: f64 = 2.0;
/// Weight of each interest both users share.
pub const W_SHARED_INTEREST: f64 = 1.5;
/// Longest candidate list kept per user.
pub const DEFAULT_TOP_K: usize = 20;

/// Ranked candidate ids per user, best first.
pub type Recommendations = BTreeMap<Uuid, Vec<Uuid>>;

/// Point-in-time view of the skill/interest relation. Names are lowercased.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub user_ids: Vec<Uuid>,
    pub skills: HashMap<Uuid, HashSet<String>>,
    pub interests: HashMap<Uuid, HashSet<String>>,
}

impl Snapshot {
    pub fn new(user_ids: Vec<Uuid>) -> Self {
        Self {
            user_ids,
            ..Default::default()
        }
    }

    pub fn add_skill(&mut self, user_id: Uuid, name: &str) {
        self.skills.entry(user_id).or_default().insert(name.to_lowercase());
    }

    pub fn add_interest(&mut self, user_id: Uuid, name: &str) {
        self.interests.entry(user_id).or_default().insert(name.to_lowercase());
    }

    fn skills_of(&self, user_id: &Uuid) -> Option<&HashSet<String>> {
        self.skills.get(user_id)
    }

    fn interests_of(&self, user_id: &Uuid) -> Option<&HashSet<String>> {
        self.interests.get(user_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ScoredCandidate {
    user_id: Uuid,
    score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationStats {
    pub users: usize,
    pub lists: usize,
    pub candidates: usize,
}

/// Skills the candidate brings that the user does not have.
pub fn unique_skills(user: Option<&HashSet<String>>, candidate: Option<&HashSet<String>>) -> usize {
    match (user, candidate) {
        (_, None) => 0,
        (None, Some(c)) => c.len(),
        (Some(u), Some(c)) => c.difference(u).count(),
    }
}

/// Interests present on both sides.
pub fn shared_interests(user: Option<&HashSet<String>>, candidate: Option<&HashSet<String>>) -> usize {
    match (user, candidate) {
        (Some(u), Some(c)) => u.intersection(c).count(),
        _ => 0,
    }
}

/// `2.0 × unique_skills + 1.5 × shared_interests` for the ordered pair.
pub fn score(snapshot: &Snapshot, user_id: &Uuid, candidate_id: &Uuid) -> f64 {
    let skills = unique_skills(snapshot.skills_of(user_id), snapshot.skills_of(candidate_id));
    let interests = shared_interests(snapshot.interests_of(user_id), snapshot.interests_of(candidate_id));
    W_UNIQUE_SKILL * skills as f64 + W_SHARED_INTEREST * interests as f64
}

/// Scores every candidate other than `user_id`, best first.
///
/// Equal scores are ordered by candidate id ascending so the result does not
/// depend on the order users were loaded in.
fn rank_among(snapshot: &Snapshot, candidates: &[Uuid], user_id: &Uuid, top_k: usize) -> Vec<ScoredCandidate> {
    let mut scored: Vec<ScoredCandidate> = candidates
        .iter()
        .filter(|c| *c != user_id)
        .map(|c| ScoredCandidate {
            user_id: *c,
            score: score(snapshot, user_id, c),
        })
        .collect();

    scored.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.user_id.cmp(&b.user_id)));
    scored.truncate(top_k);
    scored
}

fn distinct_ids(snapshot: &Snapshot) -> Vec<Uuid> {
    let mut ids = snapshot.user_ids.clone();
    ids.sort();
    ids.dedup();
    ids
}

/// Builds the full candidate table. O(n²) in the number of users.
pub fn generate(snapshot: &Snapshot, top_k: usize) -> Recommendations {
    let ids = distinct_ids(snapshot);
    ids.iter()
        .map(|user_id| {
            let ranked = rank_among(snapshot, &ids, user_id, top_k)
                .into_iter()
                .map(|c| c.user_id)
                .collect();
            (*user_id, ranked)
        })
        .collect()
}

pub fn stats(recommendations: &Recommendations) -> GenerationStats {
    GenerationStats {
        users: recommendations.len(),
        lists: recommendations.values().filter(|l| !l.is_empty()).count(),
        candidates: recommendations.values().map(Vec::len).sum(),
    }
}
