// src/handlers/attempt.rs

use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;

use crate::{
    config::Config,
    error::AppError,
    models::attempt::{SubmitAttempt, SubmitAttemptRequest},
    services::attempt,
    store::SharedStore,
    utils::{jwt::Claims, validate::parse_id},
};

/// Records a quiz attempt with all of its answers.
///
/// * Validates every answer before anything is written.
/// * The score is computed server-side; a client score is ignored.
/// * A question answered twice rejects the whole attempt (409).
pub async fn submit_attempt(
    State(store): State<SharedStore>,
    State(config): State<Config>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<SubmitAttemptRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;
    let cmd = SubmitAttempt::try_from(payload)?;
    claims.ensure_can_access(cmd.student_id)?;

    let recorded =
        attempt::submit_attempt(store.as_ref(), cmd, config.strict_answer_references).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Quiz attempt recorded",
            "data": recorded,
        })),
    ))
}

/// Attempt history of a student, newest first.
pub async fn list_user_attempts(
    State(store): State<SharedStore>,
    Extension(claims): Extension<Claims>,
    Path(student_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = parse_id("student_id", &student_id)?;
    claims.ensure_can_access(student_id)?;

    let list = attempt::list_attempts(store.as_ref(), student_id).await?;

    Ok(Json(json!({
        "success": true,
        "count": list.len(),
        "data": list,
    })))
}

/// Answers of one attempt with question and option content.
pub async fn get_attempt_answers(
    State(store): State<SharedStore>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let attempt_id = parse_id("attempt_id", &attempt_id)?;
    let recorded = attempt::find_attempt(store.as_ref(), attempt_id).await?;
    claims.ensure_can_access(recorded.student_id)?;

    let answers = attempt::attempt_answers(store.as_ref(), attempt_id).await?;

    Ok(Json(json!({
        "success": true,
        "count": answers.len(),
        "data": answers,
    })))
}

/// Replays the stored answers of an attempt against the current answer key.
/// Admin only; the stored score is left untouched.
pub async fn get_attempt_score(
    State(store): State<SharedStore>,
    Path(attempt_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let attempt_id = parse_id("attempt_id", &attempt_id)?;
    let recorded = attempt::find_attempt(store.as_ref(), attempt_id).await?;
    let replay = attempt::replay_score(store.as_ref(), &recorded).await?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "attempt_id": recorded.id,
            "recorded_score": recorded.score,
            "replayed": replay,
        },
    })))
}
