//! In-memory storage driver.
//!
//! Each conditional write checks and applies under one write lock, which
//! gives the same per-row compare-and-set behaviour as the database driver.
//! Used for tests and for running without `DATABASE_URL`.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::backend::{Backend, BackendError, Dialer, split_page};
use crate::models::{
    quiz::{Quiz, QuizCore},
    response::QuizResponse,
    user::User,
};

#[derive(Default)]
struct Tables {
    users: HashMap<(String, String), User>,
    quizzes: HashMap<String, Quiz>,
    /// Keyed by (quiz_id, username) so a quiz's responses are contiguous.
    responses: BTreeMap<(String, String), QuizResponse>,
}

#[derive(Default)]
pub struct MemoryBackend {
    tables: RwLock<Tables>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Quizzes an author may still edit, delete or publish.
fn editable_by<'a>(
    quizzes: &'a mut HashMap<String, Quiz>,
    quiz_id: &str,
    author: &str,
) -> Option<&'a mut Quiz> {
    quizzes
        .get_mut(quiz_id)
        .filter(|q| q.author == author && !q.is_published && !q.is_deleted)
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn ensure_schema(&self) -> Result<(), BackendError> {
        Ok(())
    }

    async fn insert_user(&self, user: &User) -> Result<bool, BackendError> {
        let mut tables = self.tables.write().await;
        let key = (user.username.clone(), user.account_id.clone());
        if tables.users.contains_key(&key) {
            return Ok(false);
        }
        tables.users.insert(key, user.clone());
        Ok(true)
    }

    async fn select_user(
        &self,
        username: &str,
        account_id: &str,
    ) -> Result<Option<User>, BackendError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .get(&(username.to_owned(), account_id.to_owned()))
            .cloned())
    }

    async fn mark_user_deleted(
        &self,
        username: &str,
        account_id: &str,
    ) -> Result<bool, BackendError> {
        let mut tables = self.tables.write().await;
        match tables
            .users
            .get_mut(&(username.to_owned(), account_id.to_owned()))
        {
            Some(user) => {
                user.is_deleted = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn insert_quiz(&self, quiz: &Quiz) -> Result<bool, BackendError> {
        let mut tables = self.tables.write().await;
        if tables.quizzes.contains_key(&quiz.quiz_id) {
            return Ok(false);
        }
        tables.quizzes.insert(quiz.quiz_id.clone(), quiz.clone());
        Ok(true)
    }

    async fn select_quiz(&self, quiz_id: &str) -> Result<Option<Quiz>, BackendError> {
        Ok(self.tables.read().await.quizzes.get(quiz_id).cloned())
    }

    async fn update_quiz(
        &self,
        quiz_id: &str,
        author: &str,
        core: &QuizCore,
    ) -> Result<bool, BackendError> {
        let mut tables = self.tables.write().await;
        match editable_by(&mut tables.quizzes, quiz_id, author) {
            Some(quiz) => {
                quiz.core = core.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_quiz(&self, quiz_id: &str, author: &str) -> Result<bool, BackendError> {
        let mut tables = self.tables.write().await;
        match editable_by(&mut tables.quizzes, quiz_id, author) {
            Some(quiz) => {
                quiz.is_deleted = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn publish_quiz(&self, quiz_id: &str, author: &str) -> Result<bool, BackendError> {
        let mut tables = self.tables.write().await;
        match editable_by(&mut tables.quizzes, quiz_id, author) {
            Some(quiz) => {
                quiz.is_published = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn insert_response(&self, response: &QuizResponse) -> Result<bool, BackendError> {
        let mut tables = self.tables.write().await;
        let key = (response.quiz_id.clone(), response.username.clone());
        if tables.responses.contains_key(&key) {
            return Ok(false);
        }
        tables.responses.insert(key, response.clone());
        Ok(true)
    }

    async fn select_response(
        &self,
        username: &str,
        quiz_id: &str,
    ) -> Result<Option<QuizResponse>, BackendError> {
        let tables = self.tables.read().await;
        Ok(tables
            .responses
            .get(&(quiz_id.to_owned(), username.to_owned()))
            .cloned())
    }

    async fn scan_responses(&self, quiz_id: &str) -> Result<Vec<QuizResponse>, BackendError> {
        let tables = self.tables.read().await;
        Ok(tables
            .responses
            .range((quiz_id.to_owned(), String::new())..)
            .take_while(|((q, _), _)| q == quiz_id)
            .map(|(_, r)| r.clone())
            .collect())
    }

    async fn scan_responses_page(
        &self,
        quiz_id: &str,
        cursor: Option<&[u8]>,
        limit: usize,
    ) -> Result<(Vec<QuizResponse>, Option<Vec<u8>>), BackendError> {
        let start = match cursor {
            Some(after) => Bound::Excluded((
                quiz_id.to_owned(),
                String::from_utf8_lossy(after).into_owned(),
            )),
            None => Bound::Included((quiz_id.to_owned(), String::new())),
        };

        let tables = self.tables.read().await;
        let rows = tables
            .responses
            .range((start, Bound::Unbounded))
            .take_while(|((q, _), _)| q == quiz_id)
            .take(limit + 1)
            .map(|(_, r)| r.clone())
            .collect();
        Ok(split_page(rows, limit))
    }

    async fn close(&self) {}
}

/// Hands out the same in-memory session on every dial, so data survives
/// a close and reopen.
#[derive(Default)]
pub struct MemoryDialer {
    backend: Arc<MemoryBackend>,
}

impl MemoryDialer {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Dialer for MemoryDialer {
    async fn dial(&self) -> Result<Arc<dyn Backend>, BackendError> {
        let session: Arc<dyn Backend> = self.backend.clone();
        Ok(session)
    }
}
