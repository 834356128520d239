use std::collections::{HashMap, HashSet};

use chrono::Utc;
use diesel::dsl::{exists, not};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::sql_types::Double;
use uuid::Uuid;

use teamup_shared::clients::db::{checkout, DbPool};
use teamup_shared::errors::{AppError, AppResult, ErrorCode};

use crate::models::{Profile, ProfileChanges, ProfileRecord, User, UserAccount};
use crate::recommender::generator::Snapshot;
use crate::schema::{connections, interests, profiles, skills, user_interests, user_skills, users};

use super::RecommendationStore;

diesel::define_sql_function!(fn random() -> Double);

/// Postgres-backed store over the diesel connection pool.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl RecommendationStore for PgStore {
    fn ping(&self) -> AppResult<()> {
        let mut conn = checkout(&self.pool)?;
        diesel::sql_query("SELECT 1").execute(&mut conn)?;
        Ok(())
    }

    fn get_all_user_ids(&self) -> AppResult<Vec<Uuid>> {
        let mut conn = checkout(&self.pool)?;
        let ids = users::table
            .select(users::id)
            .order(users::id.asc())
            .load::<Uuid>(&mut conn)?;
        Ok(ids)
    }

    fn get_user_skill_names(&self, user_id: Uuid) -> AppResult<HashSet<String>> {
        let mut conn = checkout(&self.pool)?;
        let names = user_skills::table
            .inner_join(skills::table)
            .filter(user_skills::user_id.eq(user_id))
            .select(skills::name)
            .load::<String>(&mut conn)?;
        Ok(names.into_iter().map(|n| n.to_lowercase()).collect())
    }

    fn get_user_interest_names(&self, user_id: Uuid) -> AppResult<HashSet<String>> {
        let mut conn = checkout(&self.pool)?;
        let names = user_interests::table
            .inner_join(interests::table)
            .filter(user_interests::user_id.eq(user_id))
            .select(interests::name)
            .load::<String>(&mut conn)?;
        Ok(names.into_iter().map(|n| n.to_lowercase()).collect())
    }

    /// Three queries inside one read-only repeatable-read transaction, so the
    /// generator sees a consistent relation.
    fn snapshot(&self) -> AppResult<Snapshot> {
        let mut conn = checkout(&self.pool)?;

        let (user_ids, skill_rows, interest_rows) = conn
            .build_transaction()
            .read_only()
            .repeatable_read()
            .run(|conn| {
                let user_ids = users::table
                    .select(users::id)
                    .order(users::id.asc())
                    .load::<Uuid>(conn)?;
                let skill_rows = user_skills::table
                    .inner_join(skills::table)
                    .select((user_skills::user_id, skills::name))
                    .load::<(Uuid, String)>(conn)?;
                let interest_rows = user_interests::table
                    .inner_join(interests::table)
                    .select((user_interests::user_id, interests::name))
                    .load::<(Uuid, String)>(conn)?;
                Ok::<_, diesel::result::Error>((user_ids, skill_rows, interest_rows))
            })?;

        let mut snapshot = Snapshot::new(user_ids);
        for (user_id, name) in &skill_rows {
            snapshot.add_skill(*user_id, name);
        }
        for (user_id, name) in &interest_rows {
            snapshot.add_interest(*user_id, name);
        }

        tracing::debug!(
            users = snapshot.user_ids.len(),
            skill_rows = skill_rows.len(),
            interest_rows = interest_rows.len(),
            "snapshot loaded"
        );
        Ok(snapshot)
    }

    fn get_connection_pairs(&self, user_id: Uuid) -> AppResult<Vec<Uuid>> {
        let mut conn = checkout(&self.pool)?;
        let rows = connections::table
            .filter(
                connections::requester_id.eq(user_id)
                    .or(connections::target_id.eq(user_id)),
            )
            .select((connections::requester_id, connections::target_id))
            .load::<(Uuid, Uuid)>(&mut conn)?;

        let mut seen = HashSet::new();
        Ok(rows
            .into_iter()
            .map(|(requester, target)| if requester == user_id { target } else { requester })
            .filter(|other| seen.insert(*other))
            .collect())
    }

    fn is_requested(&self, from: Uuid, to: Uuid) -> AppResult<bool> {
        let mut conn = checkout(&self.pool)?;
        let found = diesel::select(exists(
            connections::table
                .filter(connections::requester_id.eq(from))
                .filter(connections::target_id.eq(to)),
        ))
        .get_result::<bool>(&mut conn)?;
        Ok(found)
    }

    fn get_fallback_candidates(&self, excluded: &HashSet<Uuid>, limit: usize) -> AppResult<Vec<Uuid>> {
        let mut conn = checkout(&self.pool)?;
        let excluded: Vec<Uuid> = excluded.iter().copied().collect();
        let ids = users::table
            .filter(not(users::id.eq_any(&excluded)))
            .order(random())
            .limit(limit as i64)
            .select(users::id)
            .load::<Uuid>(&mut conn)?;
        Ok(ids)
    }

    fn get_profile_batch(&self, ids: &[Uuid]) -> AppResult<Vec<ProfileRecord>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let mut conn = checkout(&self.pool)?;
        load_profile_records(&mut conn, ids).map_err(AppError::from)
    }

    fn get_user_account(&self, user_id: Uuid) -> AppResult<Option<UserAccount>> {
        let mut conn = checkout(&self.pool)?;
        let user = users::table
            .find(user_id)
            .select(User::as_select())
            .first::<User>(&mut conn)
            .optional()?;
        Ok(user.map(UserAccount::from))
    }

    fn update_profile(&self, user_id: Uuid, changes: &ProfileChanges) -> AppResult<ProfileRecord> {
        let mut conn = checkout(&self.pool)?;

        conn.transaction::<_, AppError, _>(|conn| {
            let profile_id: Uuid = profiles::table
                .filter(profiles::user_id.eq(user_id))
                .select(profiles::id)
                .first(conn)
                .optional()?
                .ok_or_else(|| AppError::new(ErrorCode::ProfileNotFound, "profile not found"))?;

            let changeset = changes.changeset();
            diesel::update(profiles::table.find(profile_id))
                .set((&changeset, profiles::updated_at.eq(Utc::now())))
                .execute(conn)?;

            if let Some(names) = &changes.skills {
                replace_skills(conn, user_id, names)?;
            }
            if let Some(names) = &changes.interests {
                replace_interests(conn, user_id, names)?;
            }
            Ok(())
        })?;

        load_profile_records(&mut conn, &[user_id])?
            .pop()
            .ok_or_else(|| AppError::new(ErrorCode::ProfileNotFound, "profile not found"))
    }
}

fn load_profile_records(conn: &mut PgConnection, ids: &[Uuid]) -> QueryResult<Vec<ProfileRecord>> {
    let ids = ids.to_vec();

    let rows = profiles::table
        .filter(profiles::user_id.eq_any(&ids))
        .select(Profile::as_select())
        .load::<Profile>(conn)?;

    let skill_rows = user_skills::table
        .inner_join(skills::table)
        .filter(user_skills::user_id.eq_any(&ids))
        .order(skills::name.asc())
        .select((user_skills::user_id, skills::name))
        .load::<(Uuid, String)>(conn)?;

    let interest_rows = user_interests::table
        .inner_join(interests::table)
        .filter(user_interests::user_id.eq_any(&ids))
        .order(interests::name.asc())
        .select((user_interests::user_id, interests::name))
        .load::<(Uuid, String)>(conn)?;

    let edges: HashSet<(Uuid, Uuid)> = connections::table
        .filter(
            connections::requester_id.eq_any(&ids)
                .or(connections::target_id.eq_any(&ids)),
        )
        .select((connections::requester_id, connections::target_id))
        .load::<(Uuid, Uuid)>(conn)?
        .into_iter()
        .collect();

    let mut skills_by_user = group_names(skill_rows);
    let mut interests_by_user = group_names(interest_rows);
    let counts = mutual_counts(&edges);

    Ok(rows
        .into_iter()
        .map(|profile| {
            let user_id = profile.user_id;
            ProfileRecord::from_row(
                profile,
                skills_by_user.remove(&user_id).unwrap_or_default(),
                interests_by_user.remove(&user_id).unwrap_or_default(),
                counts.get(&user_id).copied().unwrap_or(0),
            )
        })
        .collect())
}

fn group_names(rows: Vec<(Uuid, String)>) -> HashMap<Uuid, Vec<String>> {
    let mut grouped: HashMap<Uuid, Vec<String>> = HashMap::new();
    for (user_id, name) in rows {
        grouped.entry(user_id).or_default().push(name);
    }
    grouped
}

/// Number of mutual partners per user, given directed request edges.
pub(crate) fn mutual_counts(edges: &HashSet<(Uuid, Uuid)>) -> HashMap<Uuid, i64> {
    let mut counts: HashMap<Uuid, i64> = HashMap::new();
    for (a, b) in edges {
        if a != b && edges.contains(&(*b, *a)) {
            *counts.entry(*a).or_default() += 1;
        }
    }
    counts
}

fn replace_skills(conn: &mut PgConnection, user_id: Uuid, names: &[String]) -> QueryResult<()> {
    diesel::delete(user_skills::table.filter(user_skills::user_id.eq(user_id))).execute(conn)?;
    if names.is_empty() {
        return Ok(());
    }

    let vocabulary: Vec<_> = names.iter().map(|n| skills::name.eq(n)).collect();
    diesel::insert_into(skills::table)
        .values(&vocabulary)
        .on_conflict(skills::name)
        .do_nothing()
        .execute(conn)?;

    let skill_ids = skills::table
        .filter(skills::name.eq_any(names))
        .select(skills::id)
        .load::<i32>(conn)?;

    let links: Vec<_> = skill_ids
        .into_iter()
        .map(|id| (user_skills::user_id.eq(user_id), user_skills::skill_id.eq(id)))
        .collect();
    diesel::insert_into(user_skills::table).values(&links).execute(conn)?;
    Ok(())
}

fn replace_interests(conn: &mut PgConnection, user_id: Uuid, names: &[String]) -> QueryResult<()> {
    diesel::delete(user_interests::table.filter(user_interests::user_id.eq(user_id))).execute(conn)?;
    if names.is_empty() {
        return Ok(());
    }

    let vocabulary: Vec<_> = names.iter().map(|n| interests::name.eq(n)).collect();
    diesel::insert_into(interests::table)
        .values(&vocabulary)
        .on_conflict(interests::name)
        .do_nothing()
        .execute(conn)?;

    let interest_ids = interests::table
        .filter(interests::name.eq_any(names))
        .select(interests::id)
        .load::<i32>(conn)?;

    let links: Vec<_> = interest_ids
        .into_iter()
        .map(|id| (user_interests::user_id.eq(user_id), user_interests::interest_id.eq(id)))
        .collect();
    diesel::insert_into(user_interests::table).values(&links).execute(conn)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    #[test]
    fn mutual_counts_ignore_one_sided_requests() {
        let edges: HashSet<(Uuid, Uuid)> = [
            (id(1), id(2)),
            (id(2), id(1)),
            (id(1), id(3)),
            (id(4), id(1)),
            (id(1), id(4)),
        ]
        .into_iter()
        .collect();

        let counts = mutual_counts(&edges);
        assert_eq!(counts.get(&id(1)), Some(&2));
        assert_eq!(counts.get(&id(2)), Some(&1));
        assert_eq!(counts.get(&id(3)), None);
        assert_eq!(counts.get(&id(4)), Some(&1));
    }
}
