// src/handlers/quiz.rs

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde_json::json;

use crate::{
    error::AppError,
    models::quiz::{PublicQuizDetail, QuizListParams},
    services::attempt,
    store::SharedStore,
    utils::{jwt::Claims, validate::parse_id},
};

/// Lists quizzes, optionally for one course.
pub async fn list_quizzes(
    State(store): State<SharedStore>,
    Query(params): Query<QuizListParams>,
) -> Result<impl IntoResponse, AppError> {
    let quizzes = attempt::list_quizzes(store.as_ref(), params.course_id).await?;

    Ok(Json(json!({
        "success": true,
        "count": quizzes.len(),
        "data": quizzes,
    })))
}

/// Returns a quiz with its questions and options.
/// Students get the public projection (no correctness flags); admins get everything.
pub async fn get_quiz(
    State(store): State<SharedStore>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let quiz_id = parse_id("quiz_id", &quiz_id)?;
    let detail = attempt::quiz_detail(store.as_ref(), quiz_id).await?;

    let data = if claims.is_admin() {
        serde_json::to_value(detail)
    } else {
        serde_json::to_value(PublicQuizDetail::from(detail))
    }
    .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    Ok(Json(json!({ "success": true, "data": data })))
}
