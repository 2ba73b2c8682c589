// src/handlers/response.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use crate::{
    cache::QuizReader,
    error::AppError,
    grading::grade,
    models::{
        quiz::Quiz,
        response::{QuizResponse, SubmitResponseRequest},
    },
    pagination::{prepare_stats_request, prepare_stats_response},
    store::RecordStore,
    utils::{cursor::CursorCipher, jwt::Claims},
};

/// Submits the caller's answer sheet and records the score.
///
/// * The quiz must be published and not deleted.
/// * The score is computed once, here, and never changes afterwards.
/// * A second submission for the same quiz is rejected with 409.
pub async fn submit_response(
    State(store): State<Arc<RecordStore>>,
    State(reader): State<Arc<QuizReader>>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<String>,
    Json(payload): Json<SubmitResponseRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let quiz = reader.get_quiz(&quiz_id).await?;
    if !quiz.is_cacheable() {
        return Err(AppError::NotFound(format!("Quiz '{quiz_id}' not found")));
    }

    let score = grade(&payload.responses, &quiz.core)?;

    let response = QuizResponse {
        username: claims.sub,
        quiz_id: quiz.quiz_id,
        author: quiz.author,
        score,
        responses: payload.responses,
    };
    store.create_response(response.clone()).await?;
    tracing::info!(
        quiz_id = %response.quiz_id,
        username = %response.username,
        score,
        "Response recorded"
    );

    Ok((StatusCode::CREATED, Json(response)))
}

/// Returns the caller's own response to a quiz.
pub async fn get_my_response(
    State(store): State<Arc<RecordStore>>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let response = store.read_response(&claims.sub, &quiz_id).await?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsQuery {
    #[serde(default)]
    pub page_cursor: String,
    pub page_size: Option<String>,
}

/// Statistics are visible to the quiz author only.
async fn authored_quiz(
    reader: &QuizReader,
    quiz_id: &str,
    username: &str,
) -> Result<Quiz, AppError> {
    let quiz = reader.get_quiz(quiz_id).await?;
    if quiz.is_deleted {
        return Err(AppError::NotFound(format!("Quiz '{quiz_id}' not found")));
    }
    if quiz.author != username {
        return Err(AppError::Forbidden(
            "Only the author can view statistics".to_string(),
        ));
    }
    Ok(quiz)
}

/// One page of responses to a quiz, with an opaque cursor for the next.
pub async fn get_stats_page(
    State(store): State<Arc<RecordStore>>,
    State(reader): State<Arc<QuizReader>>,
    State(cipher): State<Arc<dyn CursorCipher>>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<String>,
    Query(query): Query<StatsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let page_size = query.page_size.as_deref().unwrap_or("0");
    let request = prepare_stats_request(&quiz_id, &query.page_cursor, page_size, cipher.as_ref())?;

    authored_quiz(&reader, &quiz_id, &claims.sub).await?;

    let page = store.read_response_statistics_page(request).await?;
    let response = prepare_stats_response(page, &quiz_id, cipher.as_ref())?;

    Ok(Json(response))
}

/// Every response to a quiz in one list.
pub async fn get_all_stats(
    State(store): State<Arc<RecordStore>>,
    State(reader): State<Arc<QuizReader>>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    authored_quiz(&reader, &quiz_id, &claims.sub).await?;

    let records = store.read_response_statistics(&quiz_id).await?;

    Ok(Json(json!({
        "quizId": quiz_id,
        "total": records.len(),
        "records": records,
    })))
}
