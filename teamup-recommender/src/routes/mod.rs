pub mod admin;
pub mod connections;
pub mod health;
pub mod profile;
pub mod recommendations;

use teamup_shared::errors::{AppError, AppResult};

/// Runs a blocking store or cache call on Tokio's blocking pool.
pub(crate) async fn run_blocking<T, F>(f: F) -> AppResult<T>
where
    F: FnOnce() -> AppResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::internal(format!("blocking task failed: {e}")))?
}
