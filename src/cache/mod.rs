//! Cache-aside reads for quizzes.

pub mod local;
pub mod redis_cache;

use std::sync::Arc;

use async_trait::async_trait;

use crate::{error::AppError, models::quiz::Quiz, store::RecordStore};

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The key is not cached (or has expired).
    #[error("cache miss")]
    Miss,

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("redis pool error: {0}")]
    Pool(#[from] deadpool_redis::PoolError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid redis configuration: {0}")]
    Config(#[from] deadpool_redis::CreatePoolError),
}

/// Key/value cache holding quiz snapshots.
#[async_trait]
pub trait QuizCache: Send + Sync {
    /// Returns `CacheError::Miss` when the key is absent.
    async fn get(&self, key: &str) -> Result<Quiz, CacheError>;

    async fn set(&self, key: &str, quiz: &Quiz) -> Result<(), CacheError>;
}

/// Reads quizzes through the cache, falling back to the record store.
pub struct QuizReader {
    store: Arc<RecordStore>,
    cache: Arc<dyn QuizCache>,
}

impl QuizReader {
    pub fn new(store: Arc<RecordStore>, cache: Arc<dyn QuizCache>) -> Self {
        Self { store, cache }
    }

    /// Cache hit returns immediately. On a miss the store is read and,
    /// for published live quizzes only, the cache is filled best-effort.
    pub async fn get_quiz(&self, quiz_id: &str) -> Result<Quiz, AppError> {
        match self.cache.get(quiz_id).await {
            Ok(quiz) => {
                tracing::debug!(quiz_id, "quiz cache hit");
                return Ok(quiz);
            }
            Err(CacheError::Miss) => tracing::debug!(quiz_id, "quiz cache miss"),
            Err(e) => tracing::warn!(quiz_id, error = %e, "quiz cache read failed"),
        }

        let quiz = self.store.read_quiz(quiz_id).await?;

        if quiz.is_cacheable() {
            if let Err(e) = self.cache.set(quiz_id, &quiz).await {
                tracing::warn!(quiz_id, error = %e, "quiz cache write failed");
            }
        }

        Ok(quiz)
    }
}
