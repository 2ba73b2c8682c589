//! In-process quiz cache backed by DashMap.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use super::{CacheError, QuizCache};
use crate::models::quiz::Quiz;

/// A cached entry with TTL support.
#[derive(Clone, Debug)]
struct CachedEntry {
    quiz: Quiz,
    cached_at: Instant,
}

/// Single-instance cache. Entries expire after `ttl`.
pub struct LocalCache {
    entries: DashMap<String, CachedEntry>,
    ttl: Duration,
}

impl LocalCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl QuizCache for LocalCache {
    async fn get(&self, key: &str) -> Result<Quiz, CacheError> {
        if let Some(entry) = self.entries.get(key) {
            if entry.cached_at.elapsed() <= self.ttl {
                return Ok(entry.quiz.clone());
            }
            // Remove expired entry
            drop(entry);
            self.entries.remove(key);
        }
        Err(CacheError::Miss)
    }

    async fn set(&self, key: &str, quiz: &Quiz) -> Result<(), CacheError> {
        self.entries.insert(
            key.to_string(),
            CachedEntry {
                quiz: quiz.clone(),
                cached_at: Instant::now(),
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::quiz::{Question, QuizCore};

    fn quiz() -> Quiz {
        Quiz::new(
            "bob",
            QuizCore {
                title: "Lifetimes".to_string(),
                marking_type: "none".to_string(),
                questions: vec![Question {
                    description: "Is 'static a lifetime?".to_string(),
                    asset: None,
                    options: vec!["yes".to_string(), "no".to_string()],
                    answers: vec![0],
                }],
            },
        )
    }

    #[tokio::test]
    async fn miss_then_hit() {
        let cache = LocalCache::new(Duration::from_secs(60));
        let quiz = quiz();

        assert!(matches!(cache.get(&quiz.quiz_id).await, Err(CacheError::Miss)));
        cache.set(&quiz.quiz_id, &quiz).await.unwrap();
        assert_eq!(cache.get(&quiz.quiz_id).await.unwrap(), quiz);
    }

    #[tokio::test]
    async fn expired_entries_are_evicted() {
        let cache = LocalCache::new(Duration::ZERO);
        let quiz = quiz();

        cache.set(&quiz.quiz_id, &quiz).await.unwrap();
        std::thread::sleep(Duration::from_millis(5));
        assert!(matches!(cache.get(&quiz.quiz_id).await, Err(CacheError::Miss)));
        assert!(cache.is_empty());
    }
}
