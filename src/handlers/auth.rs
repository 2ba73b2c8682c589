// src/handlers/auth.rs

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    models::user::{CreateUserRequest, LoginRequest, User},
    store::RecordStore,
    utils::{
        hash::{hash_password, verify_password},
        jwt::sign_jwt,
    },
};

/// Registers a new user.
///
/// Hashes the password using Argon2 before storing it.
/// Returns 201 Created and the user object (excluding password).
pub async fn register(
    State(store): State<Arc<RecordStore>>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let hashed_password = hash_password(&payload.password)?;

    store
        .create_user(User {
            username: payload.username.clone(),
            account_id: String::new(),
            password: hashed_password,
            first_name: payload.first_name,
            last_name: payload.last_name,
            email: payload.email,
            is_deleted: false,
        })
        .await?;

    let user = store.read_user(&payload.username).await?;
    tracing::info!(username = %user.username, "User registered");

    Ok((StatusCode::CREATED, Json(user)))
}

/// Authenticates a user and returns a JWT token.
///
/// Unknown, deleted and wrong-password logins all look the same to the caller.
pub async fn login(
    State(store): State<Arc<RecordStore>>,
    State(config): State<Config>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let user = match store.read_user(&payload.username).await {
        Ok(user) if !user.is_deleted => user,
        Ok(_) | Err(AppError::NotFound(_)) => {
            return Err(AppError::Unauthorized("Invalid credentials".to_string()));
        }
        Err(e) => return Err(e),
    };

    if !verify_password(&payload.password, &user.password)? {
        return Err(AppError::Unauthorized("Invalid credentials".to_string()));
    }

    let token = sign_jwt(&user.username, &config.jwt_secret, config.jwt_expiration)?;

    Ok(Json(json!({
        "token": token,
        "type": "Bearer",
    })))
}
