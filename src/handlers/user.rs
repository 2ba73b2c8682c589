// src/handlers/user.rs

use std::sync::Arc;

use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};

use crate::{error::AppError, store::RecordStore, utils::jwt::Claims};

/// Returns the caller's account.
pub async fn get_me(
    State(store): State<Arc<RecordStore>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user = store.read_user(&claims.sub).await?;
    if user.is_deleted {
        return Err(AppError::NotFound(format!("User '{}' not found", claims.sub)));
    }
    Ok(Json(user))
}

/// Soft-deletes the caller's account.
pub async fn delete_me(
    State(store): State<Arc<RecordStore>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    store.delete_user(&claims.sub).await?;
    tracing::info!(username = %claims.sub, "User deleted");
    Ok(StatusCode::NO_CONTENT)
}
