//! Shared quiz cache backed by Redis.

use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Config as RedisConfig, Pool, Runtime};
use redis::AsyncCommands;

use super::{CacheError, QuizCache};
use crate::models::quiz::Quiz;

/// Quizzes are stored as JSON strings under `quiz:<id>` with a TTL.
pub struct RedisCache {
    pool: Pool,
    ttl: Duration,
}

impl RedisCache {
    pub fn new(pool: Pool, ttl: Duration) -> Self {
        Self { pool, ttl }
    }

    /// Builds a connection pool for `redis_url`. No connection is made yet.
    pub fn from_url(redis_url: &str, ttl: Duration) -> Result<Self, CacheError> {
        let pool = RedisConfig::from_url(redis_url).create_pool(Some(Runtime::Tokio1))?;
        Ok(Self::new(pool, ttl))
    }

    fn key(quiz_id: &str) -> String {
        format!("quiz:{quiz_id}")
    }
}

fn encode(quiz: &Quiz) -> Result<String, CacheError> {
    Ok(serde_json::to_string(quiz)?)
}

fn decode(json: &str) -> Result<Quiz, CacheError> {
    Ok(serde_json::from_str(json)?)
}

#[async_trait]
impl QuizCache for RedisCache {
    async fn get(&self, key: &str) -> Result<Quiz, CacheError> {
        let mut conn = self.pool.get().await?;
        let cached: Option<String> = conn.get(Self::key(key)).await?;
        match cached {
            Some(json) => decode(&json),
            None => Err(CacheError::Miss),
        }
    }

    async fn set(&self, key: &str, quiz: &Quiz) -> Result<(), CacheError> {
        let json = encode(quiz)?;
        let mut conn = self.pool.get().await?;
        conn.set_ex::<_, _, ()>(Self::key(key), json, self.ttl.as_secs().max(1))
            .await?;
        tracing::debug!(quiz_id = %key, ttl_secs = self.ttl.as_secs(), "quiz cached");
        Ok(())
    }
}
