// src/handlers/auth.rs

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    models::user::{CreateUserRequest, LoginRequest, User},
    store::SharedStore,
    utils::{
        hash::{hash_password, verify_password},
        jwt::sign_jwt,
    },
};

/// Registers a new student.
///
/// Hashes the password using Argon2 before storing it.
/// Returns 201 Created and the user object (excluding password).
pub async fn register(
    State(store): State<SharedStore>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::InvalidArgument(validation_errors.to_string()));
    }

    let user = User::new_student(
        &payload.email,
        &payload.name,
        hash_password(&payload.password)?,
    );

    store.insert_user(&user).await.map_err(|e| {
        if !matches!(e, AppError::Conflict(_)) {
            tracing::error!("Failed to register user: {:?}", e);
        }
        e
    })?;

    tracing::info!(user_id = %user.id, "Student registered");

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "data": user })),
    ))
}

/// Authenticates a user and returns a JWT token.
///
/// Verifies the email and password against the store.
/// If valid, signs a JWT token with the user's ID and role.
pub async fn login(
    State(store): State<SharedStore>,
    State(config): State<Config>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;
    payload.validate()?;

    let user = store
        .find_user_by_email(payload.email.trim())
        .await?
        .ok_or(AppError::AuthError("Invalid email or password".to_string()))?;

    if !verify_password(&payload.password, &user.password_hash)? {
        return Err(AppError::AuthError("Invalid email or password".to_string()));
    }

    if !user.is_admin() {
        store.record_login(user.id, Utc::now()).await?;
    }

    let token = sign_jwt(&user, &config.jwt_secret, config.jwt_expiration)?;

    Ok(Json(json!({
        "token": token,
        "type": "Bearer",
        "role": user.role.name(),
        "user_id": user.id,
    })))
}
