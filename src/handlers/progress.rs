// src/handlers/progress.rs

use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;

use crate::{
    error::AppError,
    models::progress::{ProgressKey, UpdateProgressRequest, UpsertProgress},
    services::progress,
    store::SharedStore,
    utils::{jwt::Claims, validate::parse_id},
};

/// Lists a student's progress on every course they have touched.
pub async fn get_user_progress(
    State(store): State<SharedStore>,
    Extension(claims): Extension<Claims>,
    Path(student_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = parse_id("student_id", &student_id)?;
    claims.ensure_can_access(student_id)?;

    let list = progress::list_progress(store.as_ref(), student_id).await?;

    Ok(Json(json!({
        "success": true,
        "count": list.len(),
        "data": list,
    })))
}

/// Progress of a student on one course.
/// No record yet is a normal answer: `data` is null with 200.
pub async fn get_user_course_progress(
    State(store): State<SharedStore>,
    Extension(claims): Extension<Claims>,
    Path((student_id, course_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let key = ProgressKey {
        student_id: parse_id("student_id", &student_id)?,
        course_id: parse_id("course_id", &course_id)?,
    };
    claims.ensure_can_access(key.student_id)?;

    let record = progress::find_progress(store.as_ref(), key).await?;
    let message = if record.is_some() {
        "Progress retrieved"
    } else {
        "No progress recorded for this course"
    };

    Ok(Json(json!({
        "success": true,
        "message": message,
        "data": record,
    })))
}

/// Creates or merges progress for a (student, course) pair.
///
/// * 201 when the record is created by this request, 200 when merged.
/// * Percent only ever goes up; time is added, capped per report.
pub async fn update_user_course_progress(
    State(store): State<SharedStore>,
    Extension(claims): Extension<Claims>,
    Path((student_id, course_id)): Path<(String, String)>,
    payload: Result<Json<UpdateProgressRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;
    let cmd = UpsertProgress::parse(&student_id, &course_id, payload)?;
    claims.ensure_can_access(cmd.key.student_id)?;

    tracing::debug!(
        student_id = %cmd.key.student_id,
        course_id = %cmd.key.course_id,
        update = ?cmd.update,
        "Progress update received"
    );

    let (record, created) = progress::upsert_progress(store.as_ref(), cmd).await?;

    let (status, message) = if created {
        (StatusCode::CREATED, "Progress created")
    } else {
        (StatusCode::OK, "Progress updated")
    };

    Ok((
        status,
        Json(json!({
            "success": true,
            "message": message,
            "data": record,
        })),
    ))
}
