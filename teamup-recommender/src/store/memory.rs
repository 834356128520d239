use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

use uuid::Uuid;

use teamup_shared::errors::{AppError, AppResult, ErrorCode};
use teamup_shared::types::auth::UserRole;

use crate::models::{ProfileChanges, ProfileRecord, UserAccount};

use super::pg::mutual_counts;
use super::RecommendationStore;

#[derive(Debug, Default)]
struct Data {
    users: Vec<UserAccount>,
    profiles: HashMap<Uuid, ProfileRecord>,
    skills: HashMap<Uuid, Vec<String>>,
    interests: HashMap<Uuid, Vec<String>>,
    connections: HashSet<(Uuid, Uuid)>,
}

/// In-process stand-in for Postgres used by unit and router tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<Data>,
    unavailable: AtomicBool,
    snapshots: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, id: Uuid, role: UserRole) {
        let mut data = self.data.write().unwrap();
        data.users.push(UserAccount {
            id,
            role,
            verified: true,
            blocked: false,
        });
        data.profiles.insert(
            id,
            ProfileRecord {
                user_id: id,
                display_name: Some(format!("user-{}", id.as_u128())),
                college: Some("Test College".into()),
                branch: None,
                year: None,
                bio: None,
                open_for: vec![],
                skills: vec![],
                interests: vec![],
                connection_count: 0,
            },
        );
    }

    pub fn block(&self, id: Uuid) {
        let mut data = self.data.write().unwrap();
        if let Some(user) = data.users.iter_mut().find(|u| u.id == id) {
            user.blocked = true;
        }
    }

    pub fn set_skills(&self, id: Uuid, names: &[&str]) {
        self.data.write().unwrap().skills.insert(id, names.iter().map(|s| s.to_string()).collect());
    }

    pub fn set_interests(&self, id: Uuid, names: &[&str]) {
        self.data.write().unwrap().interests.insert(id, names.iter().map(|s| s.to_string()).collect());
    }

    pub fn request(&self, from: Uuid, to: Uuid) {
        self.data.write().unwrap().connections.insert((from, to));
    }

    /// Makes every call fail the way an exhausted or unreachable pool does.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn snapshot_count(&self) -> usize {
        self.snapshots.load(Ordering::SeqCst)
    }

    fn check(&self) -> AppResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::internal("db pool error: store unavailable"));
        }
        Ok(())
    }

    fn lowered(map: &HashMap<Uuid, Vec<String>>, id: &Uuid) -> HashSet<String> {
        map.get(id)
            .map(|names| names.iter().map(|n| n.to_lowercase()).collect())
            .unwrap_or_default()
    }
}

impl RecommendationStore for MemoryStore {
    fn ping(&self) -> AppResult<()> {
        self.check()
    }

    fn get_all_user_ids(&self) -> AppResult<Vec<Uuid>> {
        self.check()?;
        self.snapshots.fetch_add(1, Ordering::SeqCst);
        Ok(self.data.read().unwrap().users.iter().map(|u| u.id).collect())
    }

    fn get_user_skill_names(&self, user_id: Uuid) -> AppResult<HashSet<String>> {
        self.check()?;
        Ok(Self::lowered(&self.data.read().unwrap().skills, &user_id))
    }

    fn get_user_interest_names(&self, user_id: Uuid) -> AppResult<HashSet<String>> {
        self.check()?;
        Ok(Self::lowered(&self.data.read().unwrap().interests, &user_id))
    }

    fn get_connection_pairs(&self, user_id: Uuid) -> AppResult<Vec<Uuid>> {
        self.check()?;
        let data = self.data.read().unwrap();
        let mut seen = HashSet::new();
        Ok(data
            .connections
            .iter()
            .filter_map(|(a, b)| match (*a == user_id, *b == user_id) {
                (true, _) => Some(*b),
                (_, true) => Some(*a),
                _ => None,
            })
            .filter(|other| seen.insert(*other))
            .collect())
    }

    fn is_requested(&self, from: Uuid, to: Uuid) -> AppResult<bool> {
        self.check()?;
        Ok(self.data.read().unwrap().connections.contains(&(from, to)))
    }

    fn get_fallback_candidates(&self, excluded: &HashSet<Uuid>, limit: usize) -> AppResult<Vec<Uuid>> {
        self.check()?;
        Ok(self
            .data
            .read()
            .unwrap()
            .users
            .iter()
            .map(|u| u.id)
            .filter(|id| !excluded.contains(id))
            .take(limit)
            .collect())
    }

    fn get_profile_batch(&self, ids: &[Uuid]) -> AppResult<Vec<ProfileRecord>> {
        self.check()?;
        let data = self.data.read().unwrap();
        let counts = mutual_counts(&data.connections);
        // Reverse the requested order so callers cannot rely on store order.
        Ok(ids
            .iter()
            .rev()
            .filter_map(|id| data.profiles.get(id))
            .map(|p| {
                let mut record = p.clone();
                record.skills = data.skills.get(&p.user_id).cloned().unwrap_or_default();
                record.interests = data.interests.get(&p.user_id).cloned().unwrap_or_default();
                record.connection_count = counts.get(&p.user_id).copied().unwrap_or(0);
                record
            })
            .collect())
    }

    fn get_user_account(&self, user_id: Uuid) -> AppResult<Option<UserAccount>> {
        self.check()?;
        Ok(self.data.read().unwrap().users.iter().find(|u| u.id == user_id).cloned())
    }

    fn update_profile(&self, user_id: Uuid, changes: &ProfileChanges) -> AppResult<ProfileRecord> {
        self.check()?;
        {
            let mut data = self.data.write().unwrap();
            let profile = data
                .profiles
                .get_mut(&user_id)
                .ok_or_else(|| AppError::new(ErrorCode::ProfileNotFound, "profile not found"))?;

            if let Some(v) = &changes.display_name {
                profile.display_name = Some(v.clone());
            }
            if let Some(v) = &changes.college {
                profile.college = Some(v.clone());
            }
            if let Some(v) = &changes.branch {
                profile.branch = Some(v.clone());
            }
            if let Some(v) = changes.year {
                profile.year = Some(v);
            }
            if let Some(v) = &changes.bio {
                profile.bio = Some(v.clone());
            }
            if let Some(v) = &changes.open_for {
                profile.open_for = v.clone();
            }
            if let Some(v) = &changes.skills {
                data.skills.insert(user_id, v.clone());
            }
            if let Some(v) = &changes.interests {
                data.interests.insert(user_id, v.clone());
            }
        }

        self.get_profile_batch(&[user_id])?
            .pop()
            .ok_or_else(|| AppError::new(ErrorCode::ProfileNotFound, "profile not found"))
    }
}
