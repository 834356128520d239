use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use teamup_shared::types::auth::UserRole;

use crate::schema::{profiles, users};

// --- User ---

#[derive(Debug, Queryable, Identifiable, Selectable, Clone)]
#[diesel(table_name = users)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub verified: bool,
    pub blocked: bool,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

/// The slice of a user row that authorization decisions are made on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAccount {
    pub id: Uuid,
    pub role: UserRole,
    pub verified: bool,
    pub blocked: bool,
}

impl From<User> for UserAccount {
    fn from(user: User) -> Self {
        let role = user.role.parse().unwrap_or_else(|_| {
            tracing::warn!(user_id = %user.id, role = %user.role, "unknown persisted role, treating as user");
            UserRole::User
        });
        Self {
            id: user.id,
            role,
            verified: user.verified,
            blocked: user.blocked,
        }
    }
}

// --- Profile ---

#[derive(Debug, Queryable, Identifiable, Selectable, Clone)]
#[diesel(table_name = profiles)]
pub struct Profile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub display_name: Option<String>,
    pub college: Option<String>,
    pub branch: Option<String>,
    pub year: Option<i32>,
    pub bio: Option<String>,
    pub open_for: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, AsChangeset, Default)]
#[diesel(table_name = profiles)]
pub struct ProfileChangeset {
    pub display_name: Option<String>,
    pub college: Option<String>,
    pub branch: Option<String>,
    pub year: Option<i32>,
    pub bio: Option<String>,
    pub open_for: Option<serde_json::Value>,
}

/// Profile joined with its skills, interests and connection count. This is
/// the shape returned by `/recommendations` and `/me/profile`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProfileRecord {
    pub user_id: Uuid,
    pub display_name: Option<String>,
    pub college: Option<String>,
    pub branch: Option<String>,
    pub year: Option<i32>,
    pub bio: Option<String>,
    pub open_for: Vec<String>,
    pub skills: Vec<String>,
    pub interests: Vec<String>,
    pub connection_count: i64,
}

impl ProfileRecord {
    pub fn from_row(profile: Profile, skills: Vec<String>, interests: Vec<String>, connection_count: i64) -> Self {
        let open_for = decode_open_for(profile.user_id, &profile.open_for);
        Self {
            user_id: profile.user_id,
            display_name: profile.display_name,
            college: profile.college,
            branch: profile.branch,
            year: profile.year,
            bio: profile.bio,
            open_for,
            skills,
            interests,
            connection_count,
        }
    }
}

/// A normalized profile write. `None` leaves the stored value untouched;
/// `Some` for a list replaces the whole list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileChanges {
    pub display_name: Option<String>,
    pub college: Option<String>,
    pub branch: Option<String>,
    pub year: Option<i32>,
    pub bio: Option<String>,
    pub open_for: Option<Vec<String>>,
    pub skills: Option<Vec<String>>,
    pub interests: Option<Vec<String>>,
}

impl ProfileChanges {
    pub fn changeset(&self) -> ProfileChangeset {
        ProfileChangeset {
            display_name: self.display_name.clone(),
            college: self.college.clone(),
            branch: self.branch.clone(),
            year: self.year,
            bio: self.bio.clone(),
            open_for: self.open_for.as_ref().map(|items| encode_open_for(items)),
        }
    }
}

// --- List normalization ---

/// Skill and interest names: trimmed, lowercased, deduplicated, first-seen order.
pub fn normalize_vocabulary(names: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    names
        .iter()
        .map(|n| n.trim().to_lowercase())
        .filter(|n| !n.is_empty())
        .filter(|n| seen.insert(n.clone()))
        .collect()
}

/// `open_for` entries keep their casing but are trimmed and deduplicated.
pub fn normalize_open_for(items: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    items
        .iter()
        .map(|i| i.trim().to_string())
        .filter(|i| !i.is_empty())
        .filter(|i| seen.insert(i.clone()))
        .collect()
}

pub fn encode_open_for(items: &[String]) -> serde_json::Value {
    serde_json::Value::Array(items.iter().cloned().map(serde_json::Value::String).collect())
}

/// Reads the canonical array encoding. Anything else is a write-path bug and
/// is reported rather than re-parsed.
pub fn decode_open_for(user_id: Uuid, value: &serde_json::Value) -> Vec<String> {
    match serde_json::from_value::<Vec<String>>(value.clone()) {
        Ok(items) => items,
        Err(e) => {
            tracing::warn!(user_id = %user_id, error = %e, "open_for is not a string array, ignoring");
            Vec::new()
        }
    }
}
