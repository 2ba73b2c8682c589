//! Postgres storage driver.
//!
//! Conditional writes are single statements (`ON CONFLICT DO NOTHING`,
//! `UPDATE ... WHERE <condition>`); the applied flag is `rows_affected() == 1`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::{FromRow, PgPool, postgres::PgPoolOptions, types::Json};
use tokio::task::JoinSet;

use super::backend::{Backend, BackendError, Dialer, split_page};
use crate::models::{
    quiz::{Question, Quiz, QuizCore},
    response::QuizResponse,
    user::User,
};

const CREATE_USERS: &str = r#"
    CREATE TABLE IF NOT EXISTS users (
        username    TEXT NOT NULL,
        account_id  TEXT NOT NULL,
        password    TEXT NOT NULL,
        first_name  TEXT NOT NULL,
        last_name   TEXT NOT NULL,
        email       TEXT NOT NULL,
        is_deleted  BOOLEAN NOT NULL DEFAULT FALSE,
        PRIMARY KEY (username, account_id)
    )
"#;

const CREATE_QUIZZES: &str = r#"
    CREATE TABLE IF NOT EXISTS quizzes (
        quiz_id       TEXT PRIMARY KEY,
        author        TEXT NOT NULL,
        title         TEXT NOT NULL,
        marking_type  TEXT NOT NULL,
        questions     JSONB NOT NULL,
        is_published  BOOLEAN NOT NULL DEFAULT FALSE,
        is_deleted    BOOLEAN NOT NULL DEFAULT FALSE
    )
"#;

const CREATE_RESPONSES: &str = r#"
    CREATE TABLE IF NOT EXISTS responses (
        username   TEXT NOT NULL,
        quiz_id    TEXT NOT NULL,
        author     TEXT NOT NULL,
        score      DOUBLE PRECISION NOT NULL,
        responses  JSONB NOT NULL,
        PRIMARY KEY (username, quiz_id)
    )
"#;

const CREATE_RESPONSES_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS responses_quiz_id_idx ON responses (quiz_id, username)";

/// Helper struct for reading the 'quizzes' table.
#[derive(FromRow)]
struct QuizRow {
    quiz_id: String,
    author: String,
    title: String,
    marking_type: String,
    questions: Json<Vec<Question>>,
    is_published: bool,
    is_deleted: bool,
}

impl From<QuizRow> for Quiz {
    fn from(row: QuizRow) -> Self {
        Quiz {
            quiz_id: row.quiz_id,
            author: row.author,
            core: QuizCore {
                title: row.title,
                marking_type: row.marking_type,
                questions: row.questions.0,
            },
            is_published: row.is_published,
            is_deleted: row.is_deleted,
        }
    }
}

/// Helper struct for reading the 'responses' table.
#[derive(FromRow)]
struct ResponseRow {
    username: String,
    quiz_id: String,
    author: String,
    score: f64,
    responses: Json<Vec<Vec<usize>>>,
}

impl From<ResponseRow> for QuizResponse {
    fn from(row: ResponseRow) -> Self {
        QuizResponse {
            username: row.username,
            quiz_id: row.quiz_id,
            author: row.author,
            score: row.score,
            responses: row.responses.0,
        }
    }
}

pub struct PgBackend {
    pool: PgPool,
}

impl PgBackend {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Backend for PgBackend {
    /// Creates the three tables in parallel; the index waits for its table.
    async fn ensure_schema(&self) -> Result<(), BackendError> {
        let mut tasks = JoinSet::new();
        for statements in [
            vec![CREATE_USERS],
            vec![CREATE_QUIZZES],
            vec![CREATE_RESPONSES, CREATE_RESPONSES_INDEX],
        ] {
            let pool = self.pool.clone();
            tasks.spawn(async move {
                for statement in statements {
                    sqlx::query(statement).execute(&pool).await?;
                }
                Ok::<(), sqlx::Error>(())
            });
        }

        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            let outcome = match joined {
                Ok(result) => result.map_err(BackendError::from),
                Err(e) => Err(BackendError::Task(e.to_string())),
            };
            if let Err(e) = outcome {
                tracing::error!(error = %e, "Schema bootstrap task failed");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    async fn insert_user(&self, user: &User) -> Result<bool, BackendError> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (username, account_id, password, first_name, last_name, email, is_deleted)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (username, account_id) DO NOTHING
            "#,
        )
        .bind(&user.username)
        .bind(&user.account_id)
        .bind(&user.password)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(user.is_deleted)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn select_user(
        &self,
        username: &str,
        account_id: &str,
    ) -> Result<Option<User>, BackendError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT username, account_id, password, first_name, last_name, email, is_deleted
            FROM users
            WHERE username = $1 AND account_id = $2
            "#,
        )
        .bind(username)
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn mark_user_deleted(
        &self,
        username: &str,
        account_id: &str,
    ) -> Result<bool, BackendError> {
        let result = sqlx::query(
            "UPDATE users SET is_deleted = TRUE WHERE username = $1 AND account_id = $2",
        )
        .bind(username)
        .bind(account_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn insert_quiz(&self, quiz: &Quiz) -> Result<bool, BackendError> {
        let result = sqlx::query(
            r#"
            INSERT INTO quizzes (quiz_id, author, title, marking_type, questions, is_published, is_deleted)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (quiz_id) DO NOTHING
            "#,
        )
        .bind(&quiz.quiz_id)
        .bind(&quiz.author)
        .bind(&quiz.core.title)
        .bind(&quiz.core.marking_type)
        .bind(Json(&quiz.core.questions))
        .bind(quiz.is_published)
        .bind(quiz.is_deleted)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn select_quiz(&self, quiz_id: &str) -> Result<Option<Quiz>, BackendError> {
        let row = sqlx::query_as::<_, QuizRow>(
            r#"
            SELECT quiz_id, author, title, marking_type, questions, is_published, is_deleted
            FROM quizzes
            WHERE quiz_id = $1
            "#,
        )
        .bind(quiz_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Quiz::from))
    }

    async fn update_quiz(
        &self,
        quiz_id: &str,
        author: &str,
        core: &QuizCore,
    ) -> Result<bool, BackendError> {
        let result = sqlx::query(
            r#"
            UPDATE quizzes
            SET title = $3, marking_type = $4, questions = $5
            WHERE quiz_id = $1 AND author = $2 AND is_published = FALSE AND is_deleted = FALSE
            "#,
        )
        .bind(quiz_id)
        .bind(author)
        .bind(&core.title)
        .bind(&core.marking_type)
        .bind(Json(&core.questions))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete_quiz(&self, quiz_id: &str, author: &str) -> Result<bool, BackendError> {
        let result = sqlx::query(
            r#"
            UPDATE quizzes
            SET is_deleted = TRUE
            WHERE quiz_id = $1 AND author = $2 AND is_published = FALSE AND is_deleted = FALSE
            "#,
        )
        .bind(quiz_id)
        .bind(author)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn publish_quiz(&self, quiz_id: &str, author: &str) -> Result<bool, BackendError> {
        let result = sqlx::query(
            r#"
            UPDATE quizzes
            SET is_published = TRUE
            WHERE quiz_id = $1 AND author = $2 AND is_published = FALSE AND is_deleted = FALSE
            "#,
        )
        .bind(quiz_id)
        .bind(author)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn insert_response(&self, response: &QuizResponse) -> Result<bool, BackendError> {
        let result = sqlx::query(
            r#"
            INSERT INTO responses (username, quiz_id, author, score, responses)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (username, quiz_id) DO NOTHING
            "#,
        )
        .bind(&response.username)
        .bind(&response.quiz_id)
        .bind(&response.author)
        .bind(response.score)
        .bind(Json(&response.responses))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn select_response(
        &self,
        username: &str,
        quiz_id: &str,
    ) -> Result<Option<QuizResponse>, BackendError> {
        let row = sqlx::query_as::<_, ResponseRow>(
            r#"
            SELECT username, quiz_id, author, score, responses
            FROM responses
            WHERE username = $1 AND quiz_id = $2
            "#,
        )
        .bind(username)
        .bind(quiz_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(QuizResponse::from))
    }

    async fn scan_responses(&self, quiz_id: &str) -> Result<Vec<QuizResponse>, BackendError> {
        let rows = sqlx::query_as::<_, ResponseRow>(
            r#"
            SELECT username, quiz_id, author, score, responses
            FROM responses
            WHERE quiz_id = $1
            ORDER BY username
            "#,
        )
        .bind(quiz_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(QuizResponse::from).collect())
    }

    async fn scan_responses_page(
        &self,
        quiz_id: &str,
        cursor: Option<&[u8]>,
        limit: usize,
    ) -> Result<(Vec<QuizResponse>, Option<Vec<u8>>), BackendError> {
        let after = cursor.map(|c| String::from_utf8_lossy(c).into_owned());

        let rows = sqlx::query_as::<_, ResponseRow>(
            r#"
            SELECT username, quiz_id, author, score, responses
            FROM responses
            WHERE quiz_id = $1 AND ($2::TEXT IS NULL OR username > $2)
            ORDER BY username
            LIMIT $3
            "#,
        )
        .bind(quiz_id)
        .bind(after)
        .bind(limit as i64 + 1)
        .fetch_all(&self.pool)
        .await?;

        let rows = rows.into_iter().map(QuizResponse::from).collect();
        Ok(split_page(rows, limit))
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// Builds a connection pool per dial.
pub struct PgDialer {
    database_url: String,
    max_connections: u32,
    acquire_timeout: Duration,
}

impl PgDialer {
    pub fn new(database_url: &str, max_connections: u32, acquire_timeout: Duration) -> Self {
        Self {
            database_url: database_url.to_owned(),
            max_connections,
            acquire_timeout,
        }
    }
}

#[async_trait]
impl Dialer for PgDialer {
    async fn dial(&self) -> Result<Arc<dyn Backend>, BackendError> {
        let pool = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.acquire_timeout)
            .connect(&self.database_url)
            .await?;

        let session: Arc<dyn Backend> = Arc::new(PgBackend::new(pool));
        Ok(session)
    }
}
