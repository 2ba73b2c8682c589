// src/store/mod.rs

//! The record store: a single dispatch point for every read and
//! conditional write against the users, quizzes and responses tables.
//!
//! Drivers report whether each conditional write was applied. A write that
//! was not applied is never success; it becomes `Conflict`, `NotFound` or
//! `Forbidden` depending on the operation.

pub mod backend;
pub mod connector;
pub mod memory;
pub mod postgres;

use std::fmt;

use crate::{
    error::AppError,
    models::{
        quiz::{Quiz, QuizCore},
        response::{QuizResponse, StatsPage, StatsRequest},
        user::User,
    },
    pagination::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE},
    utils::hash::account_id,
};

use backend::BackendError;
use connector::{ConnectError, RetryConnector};

/// Every operation the record store understands.
#[derive(Debug, Clone)]
pub enum Operation {
    CreateUser(User),
    ReadUser { username: String },
    DeleteUser { username: String },
    CreateQuiz(Quiz),
    ReadQuiz { quiz_id: String },
    UpdateQuiz {
        quiz_id: String,
        username: String,
        core: QuizCore,
    },
    DeleteQuiz { quiz_id: String, username: String },
    PublishQuiz { quiz_id: String, username: String },
    CreateResponse(QuizResponse),
    ReadResponse { username: String, quiz_id: String },
    ReadResponseStatistics { quiz_id: String },
    ReadResponseStatisticsPage(StatsRequest),
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::CreateUser(_) => "create_user",
            Operation::ReadUser { .. } => "read_user",
            Operation::DeleteUser { .. } => "delete_user",
            Operation::CreateQuiz(_) => "create_quiz",
            Operation::ReadQuiz { .. } => "read_quiz",
            Operation::UpdateQuiz { .. } => "update_quiz",
            Operation::DeleteQuiz { .. } => "delete_quiz",
            Operation::PublishQuiz { .. } => "publish_quiz",
            Operation::CreateResponse(_) => "create_response",
            Operation::ReadResponse { .. } => "read_response",
            Operation::ReadResponseStatistics { .. } => "read_response_statistics",
            Operation::ReadResponseStatisticsPage(_) => "read_response_statistics_page",
        }
    }
}

/// What an operation produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Done,
    User(User),
    Quiz(Quiz),
    Response(QuizResponse),
    Responses(Vec<QuizResponse>),
    Page(StatsPage),
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Outcome::Done => "done",
            Outcome::User(_) => "user",
            Outcome::Quiz(_) => "quiz",
            Outcome::Response(_) => "response",
            Outcome::Responses(_) => "responses",
            Outcome::Page(_) => "page",
        };
        f.write_str(kind)
    }
}

/// Logs a driver failure where it happened and hides it behind `Internal`.
fn storage_error(operation: &str, err: BackendError) -> AppError {
    tracing::error!(operation, error = %err, "Storage operation failed");
    AppError::Internal(format!("{operation} failed"))
}

fn unexpected(operation: &str, outcome: Outcome) -> AppError {
    tracing::error!(operation, %outcome, "Unexpected outcome");
    AppError::Internal(format!("{operation} returned an unexpected result"))
}

impl From<ConnectError> for AppError {
    fn from(err: ConnectError) -> Self {
        tracing::error!(error = %err, "Storage session unavailable");
        AppError::Internal(err.to_string())
    }
}

pub struct RecordStore {
    connector: RetryConnector,
}

impl RecordStore {
    pub fn new(connector: RetryConnector) -> Self {
        Self { connector }
    }

    pub async fn open(&self) -> Result<(), ConnectError> {
        self.connector.open().await
    }

    pub async fn close(&self) -> Result<(), ConnectError> {
        self.connector.close().await
    }

    /// Creates the tables the store relies on.
    pub async fn bootstrap(&self) -> Result<(), AppError> {
        let session = self.connector.session().await?;
        session
            .ensure_schema()
            .await
            .map_err(|e| storage_error("bootstrap", e))
    }

    /// Runs one operation against the live session.
    pub async fn execute(&self, op: Operation) -> Result<Outcome, AppError> {
        let session = self.connector.session().await?;
        let name = op.name();
        tracing::debug!(operation = name, "Executing");

        match op {
            Operation::CreateUser(mut user) => {
                user.account_id = account_id(&user.username);
                user.is_deleted = false;
                let applied = session
                    .insert_user(&user)
                    .await
                    .map_err(|e| storage_error(name, e))?;
                if !applied {
                    return Err(AppError::Conflict(format!(
                        "User '{}' already exists",
                        user.username
                    )));
                }
                Ok(Outcome::Done)
            }
            Operation::ReadUser { username } => session
                .select_user(&username, &account_id(&username))
                .await
                .map_err(|e| storage_error(name, e))?
                .map(Outcome::User)
                .ok_or_else(|| AppError::NotFound(format!("User '{username}' not found"))),
            Operation::DeleteUser { username } => {
                let applied = session
                    .mark_user_deleted(&username, &account_id(&username))
                    .await
                    .map_err(|e| storage_error(name, e))?;
                if !applied {
                    return Err(AppError::NotFound(format!("User '{username}' not found")));
                }
                Ok(Outcome::Done)
            }
            Operation::CreateQuiz(mut quiz) => {
                quiz.is_published = false;
                quiz.is_deleted = false;
                let applied = session
                    .insert_quiz(&quiz)
                    .await
                    .map_err(|e| storage_error(name, e))?;
                if !applied {
                    return Err(AppError::Conflict(format!(
                        "Quiz '{}' already exists",
                        quiz.quiz_id
                    )));
                }
                Ok(Outcome::Done)
            }
            Operation::ReadQuiz { quiz_id } => session
                .select_quiz(&quiz_id)
                .await
                .map_err(|e| storage_error(name, e))?
                .map(Outcome::Quiz)
                .ok_or_else(|| AppError::NotFound(format!("Quiz '{quiz_id}' not found"))),
            Operation::UpdateQuiz {
                quiz_id,
                username,
                core,
            } => {
                let applied = session
                    .update_quiz(&quiz_id, &username, &core)
                    .await
                    .map_err(|e| storage_error(name, e))?;
                forbidden_unless(applied, "updated", &quiz_id)
            }
            Operation::DeleteQuiz { quiz_id, username } => {
                let applied = session
                    .delete_quiz(&quiz_id, &username)
                    .await
                    .map_err(|e| storage_error(name, e))?;
                forbidden_unless(applied, "deleted", &quiz_id)
            }
            Operation::PublishQuiz { quiz_id, username } => {
                let applied = session
                    .publish_quiz(&quiz_id, &username)
                    .await
                    .map_err(|e| storage_error(name, e))?;
                forbidden_unless(applied, "published", &quiz_id)
            }
            Operation::CreateResponse(response) => {
                let applied = session
                    .insert_response(&response)
                    .await
                    .map_err(|e| storage_error(name, e))?;
                if !applied {
                    return Err(AppError::Conflict(format!(
                        "User '{}' has already responded to quiz '{}'",
                        response.username, response.quiz_id
                    )));
                }
                Ok(Outcome::Done)
            }
            Operation::ReadResponse { username, quiz_id } => session
                .select_response(&username, &quiz_id)
                .await
                .map_err(|e| storage_error(name, e))?
                .map(Outcome::Response)
                .ok_or_else(|| {
                    AppError::NotFound(format!(
                        "No response from '{username}' for quiz '{quiz_id}'"
                    ))
                }),
            Operation::ReadResponseStatistics { quiz_id } => session
                .scan_responses(&quiz_id)
                .await
                .map(Outcome::Responses)
                .map_err(|e| storage_error(name, e)),
            Operation::ReadResponseStatisticsPage(request) => {
                let page_size = effective_page_size(request.page_size);
                let (records, cursor) = session
                    .scan_responses_page(
                        &request.quiz_id,
                        request.cursor.as_deref(),
                        page_size as usize,
                    )
                    .await
                    .map_err(|e| storage_error(name, e))?;
                Ok(Outcome::Page(StatsPage {
                    records,
                    cursor,
                    page_size,
                }))
            }
        }
    }

    pub async fn create_user(&self, user: User) -> Result<(), AppError> {
        self.execute(Operation::CreateUser(user)).await.map(|_| ())
    }

    pub async fn read_user(&self, username: &str) -> Result<User, AppError> {
        let op = Operation::ReadUser {
            username: username.to_owned(),
        };
        match self.execute(op).await? {
            Outcome::User(user) => Ok(user),
            other => Err(unexpected("read_user", other)),
        }
    }

    pub async fn delete_user(&self, username: &str) -> Result<(), AppError> {
        let op = Operation::DeleteUser {
            username: username.to_owned(),
        };
        self.execute(op).await.map(|_| ())
    }

    pub async fn create_quiz(&self, quiz: Quiz) -> Result<(), AppError> {
        self.execute(Operation::CreateQuiz(quiz)).await.map(|_| ())
    }

    pub async fn read_quiz(&self, quiz_id: &str) -> Result<Quiz, AppError> {
        let op = Operation::ReadQuiz {
            quiz_id: quiz_id.to_owned(),
        };
        match self.execute(op).await? {
            Outcome::Quiz(quiz) => Ok(quiz),
            other => Err(unexpected("read_quiz", other)),
        }
    }

    pub async fn update_quiz(
        &self,
        quiz_id: &str,
        username: &str,
        core: QuizCore,
    ) -> Result<(), AppError> {
        let op = Operation::UpdateQuiz {
            quiz_id: quiz_id.to_owned(),
            username: username.to_owned(),
            core,
        };
        self.execute(op).await.map(|_| ())
    }

    pub async fn delete_quiz(&self, quiz_id: &str, username: &str) -> Result<(), AppError> {
        let op = Operation::DeleteQuiz {
            quiz_id: quiz_id.to_owned(),
            username: username.to_owned(),
        };
        self.execute(op).await.map(|_| ())
    }

    pub async fn publish_quiz(&self, quiz_id: &str, username: &str) -> Result<(), AppError> {
        let op = Operation::PublishQuiz {
            quiz_id: quiz_id.to_owned(),
            username: username.to_owned(),
        };
        self.execute(op).await.map(|_| ())
    }

    pub async fn create_response(&self, response: QuizResponse) -> Result<(), AppError> {
        self.execute(Operation::CreateResponse(response))
            .await
            .map(|_| ())
    }

    pub async fn read_response(
        &self,
        username: &str,
        quiz_id: &str,
    ) -> Result<QuizResponse, AppError> {
        let op = Operation::ReadResponse {
            username: username.to_owned(),
            quiz_id: quiz_id.to_owned(),
        };
        match self.execute(op).await? {
            Outcome::Response(response) => Ok(response),
            other => Err(unexpected("read_response", other)),
        }
    }

    pub async fn read_response_statistics(
        &self,
        quiz_id: &str,
    ) -> Result<Vec<QuizResponse>, AppError> {
        let op = Operation::ReadResponseStatistics {
            quiz_id: quiz_id.to_owned(),
        };
        match self.execute(op).await? {
            Outcome::Responses(responses) => Ok(responses),
            other => Err(unexpected("read_response_statistics", other)),
        }
    }

    pub async fn read_response_statistics_page(
        &self,
        request: StatsRequest,
    ) -> Result<StatsPage, AppError> {
        match self
            .execute(Operation::ReadResponseStatisticsPage(request))
            .await?
        {
            Outcome::Page(page) => Ok(page),
            other => Err(unexpected("read_response_statistics_page", other)),
        }
    }
}

/// Zero means the default; anything above the cap is clamped.
fn effective_page_size(requested: u32) -> u32 {
    match requested {
        0 => DEFAULT_PAGE_SIZE,
        n => n.min(MAX_PAGE_SIZE),
    }
}

/// Missing quiz, wrong author and already-published are reported the same way.
fn forbidden_unless(applied: bool, action: &str, quiz_id: &str) -> Result<Outcome, AppError> {
    if applied {
        Ok(Outcome::Done)
    } else {
        Err(AppError::Forbidden(format!(
            "Quiz '{quiz_id}' cannot be {action} by this user"
        )))
    }
}
