use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::PathBuf;
use std::sync::RwLock;
use std::time::SystemTime;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use super::generator::Recommendations;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cache file {path} is not a valid recommendation map: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode recommendations: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("cache lock poisoned")]
    Poisoned,
}

pub type CacheResult<T> = Result<T, CacheError>;

/// Storage for generated candidate lists.
///
/// The cache is disposable: every entry can be rebuilt from the skill and
/// interest tables. `written_at` is the single freshness signal for the
/// whole table.
pub trait RecommendationCache: Send + Sync {
    fn get(&self, user_id: &Uuid) -> CacheResult<Option<Vec<Uuid>>>;

    fn put(&self, user_id: Uuid, candidates: Vec<Uuid>, written_at: DateTime<Utc>) -> CacheResult<()>;

    fn replace_all(&self, recommendations: &Recommendations, written_at: DateTime<Utc>) -> CacheResult<()>;

    fn written_at(&self) -> CacheResult<Option<DateTime<Utc>>>;
}

/// Fixed-window TTL.
///
/// A table is fresh while strictly less than `ttl` has elapsed since it was
/// written; at exactly `ttl` it is already stale.
#[derive(Debug, Clone, Copy)]
pub struct FreshnessPolicy {
    ttl: Duration,
}

impl FreshnessPolicy {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl }
    }

    /// `None` when `secs` does not fit chrono's duration range.
    pub fn try_from_secs(secs: u64) -> Option<Self> {
        let secs = i64::try_from(secs).ok()?;
        Duration::try_seconds(secs).map(Self::new)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn is_fresh(&self, written_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(written_at) < self.ttl
    }
}

impl Default for FreshnessPolicy {
    fn default() -> Self {
        Self::new(Duration::minutes(10))
    }
}

// --- File backend ---

/// JSON file holding the whole table; the file's mtime is `written_at`.
///
/// Writes go to a uniquely named sibling and are renamed into place, so a
/// reader never sees a half-written table even when two regenerations race.
#[derive(Debug, Clone)]
pub struct FileCache {
    path: PathBuf,
}

impl FileCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn io_err(&self, source: std::io::Error) -> CacheError {
        CacheError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn load(&self) -> CacheResult<Option<Recommendations>> {
        let bytes = match fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_err(e)),
        };

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| CacheError::Decode {
                path: self.path.clone(),
                source,
            })
    }

    fn write_atomic(&self, recommendations: &Recommendations, written_at: DateTime<Utc>) -> CacheResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
        }

        let body = serde_json::to_vec(recommendations).map_err(CacheError::Encode)?;
        let tmp = self.path.with_extension(format!("tmp-{}", Uuid::new_v4().simple()));

        let result = (|| {
            let mut file = File::create(&tmp)?;
            file.write_all(&body)?;
            file.set_modified(SystemTime::from(written_at))?;
            file.sync_all()?;
            fs::rename(&tmp, &self.path)
        })();

        if let Err(e) = result {
            let _ = fs::remove_file(&tmp);
            return Err(self.io_err(e));
        }
        Ok(())
    }
}

impl RecommendationCache for FileCache {
    fn get(&self, user_id: &Uuid) -> CacheResult<Option<Vec<Uuid>>> {
        Ok(self.load()?.and_then(|mut table| table.remove(user_id)))
    }

    fn put(&self, user_id: Uuid, candidates: Vec<Uuid>, written_at: DateTime<Utc>) -> CacheResult<()> {
        let mut table = self.load()?.unwrap_or_default();
        table.insert(user_id, candidates);
        self.write_atomic(&table, written_at)
    }

    fn replace_all(&self, recommendations: &Recommendations, written_at: DateTime<Utc>) -> CacheResult<()> {
        self.write_atomic(recommendations, written_at)
    }

    fn written_at(&self) -> CacheResult<Option<DateTime<Utc>>> {
        match fs::metadata(&self.path).and_then(|m| m.modified()) {
            Ok(modified) => Ok(Some(DateTime::<Utc>::from(modified))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.io_err(e)),
        }
    }
}

// --- Memory backend ---

#[derive(Debug, Default)]
struct MemoryState {
    table: Recommendations,
    written_at: Option<DateTime<Utc>>,
}

/// Process-local table. Lost on restart, which only costs one regeneration.
#[derive(Debug, Default)]
pub struct MemoryCache {
    state: RwLock<MemoryState>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecommendationCache for MemoryCache {
    fn get(&self, user_id: &Uuid) -> CacheResult<Option<Vec<Uuid>>> {
        let state = self.state.read().map_err(|_| CacheError::Poisoned)?;
        Ok(state.table.get(user_id).cloned())
    }

    fn put(&self, user_id: Uuid, candidates: Vec<Uuid>, written_at: DateTime<Utc>) -> CacheResult<()> {
        let mut state = self.state.write().map_err(|_| CacheError::Poisoned)?;
        state.table.insert(user_id, candidates);
        state.written_at = Some(written_at);
        Ok(())
    }

    fn replace_all(&self, recommendations: &Recommendations, written_at: DateTime<Utc>) -> CacheResult<()> {
        let mut state = self.state.write().map_err(|_| CacheError::Poisoned)?;
        state.table = recommendations.clone();
        state.written_at = Some(written_at);
        Ok(())
    }

    fn written_at(&self) -> CacheResult<Option<DateTime<Utc>>> {
        let state = self.state.read().map_err(|_| CacheError::Poisoned)?;
        Ok(state.written_at)
    }
}
