//! Driver-facing traits for the record store.
//!
//! A `Backend` is a live session against one storage engine. Every mutating
//! method is a conditional write and reports whether the engine applied it;
//! the record store decides what a `false` means.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::models::{
    quiz::{Quiz, QuizCore},
    response::QuizResponse,
    user::User,
};

/// Errors raised by a storage driver.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("connection attempt timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("bootstrap task failed: {0}")]
    Task(String),
}

/// A session against the storage engine.
///
/// Implementations must be safe for concurrent use by every caller.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Creates tables and indexes when they are missing.
    async fn ensure_schema(&self) -> Result<(), BackendError>;

    /// INSERT IF NOT EXISTS on (username, account_id).
    async fn insert_user(&self, user: &User) -> Result<bool, BackendError>;

    async fn select_user(
        &self,
        username: &str,
        account_id: &str,
    ) -> Result<Option<User>, BackendError>;

    /// Sets `is_deleted` if the row exists.
    async fn mark_user_deleted(&self, username: &str, account_id: &str)
    -> Result<bool, BackendError>;

    /// INSERT IF NOT EXISTS on quiz_id.
    async fn insert_quiz(&self, quiz: &Quiz) -> Result<bool, BackendError>;

    async fn select_quiz(&self, quiz_id: &str) -> Result<Option<Quiz>, BackendError>;

    /// Replaces the core if the row is live, unpublished and owned by `author`.
    async fn update_quiz(
        &self,
        quiz_id: &str,
        author: &str,
        core: &QuizCore,
    ) -> Result<bool, BackendError>;

    /// Sets `is_deleted` if the row is live, unpublished and owned by `author`.
    async fn delete_quiz(&self, quiz_id: &str, author: &str) -> Result<bool, BackendError>;

    /// Sets `is_published` if the row is live, unpublished and owned by `author`.
    async fn publish_quiz(&self, quiz_id: &str, author: &str) -> Result<bool, BackendError>;

    /// INSERT IF NOT EXISTS on (username, quiz_id).
    async fn insert_response(&self, response: &QuizResponse) -> Result<bool, BackendError>;

    async fn select_response(
        &self,
        username: &str,
        quiz_id: &str,
    ) -> Result<Option<QuizResponse>, BackendError>;

    /// Every response for a quiz, ordered by username.
    async fn scan_responses(&self, quiz_id: &str) -> Result<Vec<QuizResponse>, BackendError>;

    /// Up to `limit` responses after `cursor`, ordered by username.
    /// The returned cursor is `None` once the scan is exhausted.
    async fn scan_responses_page(
        &self,
        quiz_id: &str,
        cursor: Option<&[u8]>,
        limit: usize,
    ) -> Result<(Vec<QuizResponse>, Option<Vec<u8>>), BackendError>;

    /// Releases the driver's connection pool.
    async fn close(&self);
}

/// Opens sessions for the retry connector.
#[async_trait]
pub trait Dialer: Send + Sync {
    async fn dial(&self) -> Result<Arc<dyn Backend>, BackendError>;
}

/// Splits a `limit + 1` row fetch into a page and the cursor after it.
/// The cursor is the username of the last row kept.
pub(crate) fn split_page(
    mut rows: Vec<QuizResponse>,
    limit: usize,
) -> (Vec<QuizResponse>, Option<Vec<u8>>) {
    if rows.len() <= limit {
        return (rows, None);
    }
    rows.truncate(limit);
    let cursor = rows.last().map(|r| r.username.clone().into_bytes());
    (rows, cursor)
}
