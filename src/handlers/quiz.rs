// src/handlers/quiz.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use validator::Validate;

use crate::{
    cache::QuizReader,
    error::AppError,
    models::quiz::{PublicQuiz, Quiz, QuizCore},
    store::RecordStore,
    utils::jwt::Claims,
};

/// Creates an unpublished quiz owned by the caller.
pub async fn create_quiz(
    State(store): State<Arc<RecordStore>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<QuizCore>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let quiz = Quiz::new(&claims.sub, payload);
    store.create_quiz(quiz.clone()).await?;
    tracing::info!(quiz_id = %quiz.quiz_id, author = %quiz.author, "Quiz created");

    Ok((StatusCode::CREATED, Json(quiz)))
}

/// Fetches a quiz through the cache.
///
/// * Deleted quizzes and other authors' drafts are reported as missing.
/// * Only the author sees the answer key.
pub async fn get_quiz(
    State(reader): State<Arc<QuizReader>>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<String>,
) -> Result<Response, AppError> {
    let quiz = reader.get_quiz(&quiz_id).await?;
    let is_author = quiz.author == claims.sub;

    if quiz.is_deleted || (!quiz.is_published && !is_author) {
        return Err(AppError::NotFound(format!("Quiz '{quiz_id}' not found")));
    }

    if is_author {
        Ok(Json(quiz).into_response())
    } else {
        Ok(Json(PublicQuiz::from(quiz)).into_response())
    }
}

/// Replaces the title, marking type and questions of a draft.
pub async fn update_quiz(
    State(store): State<Arc<RecordStore>>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<String>,
    Json(payload): Json<QuizCore>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    store.update_quiz(&quiz_id, &claims.sub, payload).await?;
    let quiz = store.read_quiz(&quiz_id).await?;

    Ok(Json(quiz))
}

pub async fn delete_quiz(
    State(store): State<Arc<RecordStore>>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    store.delete_quiz(&quiz_id, &claims.sub).await?;
    tracing::info!(%quiz_id, "Quiz deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Publishes a draft. There is no way back.
pub async fn publish_quiz(
    State(store): State<Arc<RecordStore>>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    store.publish_quiz(&quiz_id, &claims.sub).await?;
    tracing::info!(%quiz_id, "Quiz published");
    Ok(StatusCode::NO_CONTENT)
}
