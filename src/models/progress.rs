// src/models/progress.rs

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppError,
    utils::validate::{check_non_negative, check_percent, parse_id},
};

/// Completion state of a student on a course.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProgressStatus {
    #[serde(alias = "Non commencé")]
    NotStarted,
    #[serde(alias = "En cours")]
    InProgress,
    #[serde(alias = "Terminé")]
    Completed,
}

impl ProgressStatus {
    pub const ALL: [ProgressStatus; 3] = [
        ProgressStatus::NotStarted,
        ProgressStatus::InProgress,
        ProgressStatus::Completed,
    ];

    /// Status implied by a completion percentage.
    pub fn from_percent(percent: f64) -> Self {
        if percent >= 100.0 {
            ProgressStatus::Completed
        } else if percent > 0.0 {
            ProgressStatus::InProgress
        } else {
            ProgressStatus::NotStarted
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressStatus::NotStarted => "NotStarted",
            ProgressStatus::InProgress => "InProgress",
            ProgressStatus::Completed => "Completed",
        }
    }
}

impl fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProgressStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NotStarted" | "Non commencé" => Ok(ProgressStatus::NotStarted),
            "InProgress" | "En cours" => Ok(ProgressStatus::InProgress),
            "Completed" | "Terminé" => Ok(ProgressStatus::Completed),
            other => Err(AppError::InvalidArgument(format!(
                "Invalid status '{}'. Valid statuses are: {}",
                other,
                ProgressStatus::ALL.map(|s| s.as_str()).join(", ")
            ))),
        }
    }
}

/// Unique key of a progress record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgressKey {
    pub student_id: Uuid,
    pub course_id: Uuid,
}

/// One row of the 'progress' table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub id: Uuid,
    pub student_id: Uuid,
    pub course_id: Uuid,
    pub status: ProgressStatus,

    /// Completion in [0, 100]. Never decreases.
    pub percent: f64,

    /// Accumulated seconds spent on the course.
    pub total_time_spent: i64,

    pub last_accessed: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}


/// Raw database shape; `status` is stored as TEXT.
#[derive(Debug, FromRow)]
pub struct ProgressRow {
    pub id: Uuid,
    pub student_id: Uuid,
    pub course_id: Uuid,
    pub status: String,
    pub percent: f64,
    pub total_time_spent: i64,
    pub last_accessed: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ProgressRow> for ProgressRecord {
    type Error = AppError;

    fn try_from(row: ProgressRow) -> Result<Self, Self::Error> {
        let status = row.status.parse::<ProgressStatus>().map_err(|_| {
            AppError::InternalServerError(format!("Corrupt status '{}' on progress {}", row.status, row.id))
        })?;
        Ok(ProgressRecord {
            id: row.id,
            student_id: row.student_id,
            course_id: row.course_id,
            status,
            percent: row.percent,
            total_time_spent: row.total_time_spent,
            last_accessed: row.last_accessed,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// DTO for a progress update, as sent by clients.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateProgressRequest {
    #[serde(default)]
    pub status: Option<String>,

    #[serde(default)]
    #[validate(range(min = 0.0, max = 100.0, message = "percent must be between 0 and 100"))]
    pub percent: Option<f64>,

    /// Seconds spent since the previous report.
    #[serde(default, alias = "totalTimeSpentDelta")]
    #[validate(range(min = 0, message = "total_time_spent_delta cannot be negative"))]
    pub total_time_spent_delta: Option<i64>,
}

/// Validated progress update. Every field is optional; absent fields leave
/// the stored value to the merge rules.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProgressUpdate {
    pub status: Option<ProgressStatus>,
    pub percent: Option<f64>,
    pub time_delta: Option<i64>,
}

impl TryFrom<UpdateProgressRequest> for ProgressUpdate {
    type Error = AppError;

    fn try_from(req: UpdateProgressRequest) -> Result<Self, Self::Error> {
        req.validate()?;
        Ok(ProgressUpdate {
            status: req.status.as_deref().map(str::parse::<ProgressStatus>).transpose()?,
            percent: req.percent.map(|p| check_percent("percent", p)).transpose()?,
            time_delta: req
                .total_time_spent_delta
                .map(|d| check_non_negative("total_time_spent_delta", d))
                .transpose()?,
        })
    }
}

/// Atomic-operator form of a merge into an existing record.
/// Each field maps to one store operator: max, increment, set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressMerge {
    /// `percent = max(percent, floor)`
    pub percent_floor: Option<f64>,
    /// `total_time_spent += time_increment`
    pub time_increment: i64,
    /// `status = ...`, only when it changes.
    pub status: Option<ProgressStatus>,
    /// `last_accessed = ...`
    pub last_accessed: DateTime<Utc>,
}

impl ProgressMerge {
    /// Applies the operators in place. Used by stores without native operators.
    pub fn apply_to(&self, record: &mut ProgressRecord) {
        if let Some(floor) = self.percent_floor {
            record.percent = record.percent.max(floor);
        }
        record.total_time_spent += self.time_increment;
        if let Some(status) = self.status {
            record.status = status;
        }
        record.last_accessed = self.last_accessed;
        record.updated_at = self.last_accessed;
    }
}

/// What the reconciliation engine asks the store to write.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressWrite {
    Insert(ProgressRecord),
    Merge(ProgressMerge),
}

/// Typed command for the reconciliation engine.
#[derive(Debug, Clone, Copy)]
pub struct UpsertProgress {
    pub key: ProgressKey,
    pub update: ProgressUpdate,
}

impl UpsertProgress {
    pub fn parse(student_id: &str, course_id: &str, req: UpdateProgressRequest) -> Result<Self, AppError> {
        Ok(UpsertProgress {
            key: ProgressKey {
                student_id: parse_id("student_id", student_id)?,
                course_id: parse_id("course_id", course_id)?,
            },
            update: req.try_into()?,
        })
    }
}
