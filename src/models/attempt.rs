// src/models/attempt.rs

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppError,
    utils::validate::{check_non_negative, check_percent, parse_id},
};

/// Represents the 'quiz_attempts' table in the database.
/// Immutable once committed.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct QuizAttempt {
    pub id: Uuid,
    pub student_id: Uuid,
    pub quiz_id: Uuid,
    pub submitted_at: DateTime<Utc>,

    /// Server-computed percentage in [0, 100].
    pub score: f64,
    pub duration_seconds: i64,
    pub completed: bool,
}

/// Represents the 'answers' table in the database.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Answer {
    pub id: Uuid,
    pub attempt_id: Uuid,
    pub question_id: Uuid,
    pub option_id: Uuid,
}

/// Attempt row joined with its quiz title, for history listings.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct QuizAttemptSummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub attempt: QuizAttempt,
    pub quiz_title: Option<String>,
}

/// Answer joined with question and option content.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AnswerDetail {
    pub question_id: Uuid,
    pub question_text: Option<String>,
    pub points: Option<i32>,
    pub option_id: Uuid,
    pub option_text: Option<String>,
    pub is_correct: Option<bool>,
}

/// Result of replaying stored answers against the answer key.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub earned_points: i64,
    pub total_points: i64,
    pub correct_count: usize,
    pub answered_count: usize,
    pub score: f64,
}

/// One answer as sent by clients.
#[derive(Debug, Clone, Deserialize)]
pub struct AnswerInput {
    #[serde(alias = "questionId")]
    pub question_id: String,
    #[serde(alias = "optionId")]
    pub option_id: String,
}

/// DTO for submitting a quiz attempt.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitAttemptRequest {
    #[serde(alias = "studentId")]
    pub student_id: String,

    #[serde(alias = "quizId")]
    pub quiz_id: String,

    #[serde(default)]
    pub answers: Vec<AnswerInput>,

    /// Score computed by the client. Advisory only.
    #[serde(default, alias = "selfReportedScore", alias = "self_reported_score")]
    #[validate(range(min = 0.0, max = 100.0, message = "score must be between 0 and 100"))]
    pub score: Option<f64>,

    #[serde(alias = "durationSeconds")]
    #[validate(range(min = 0, message = "duration_seconds cannot be negative"))]
    pub duration_seconds: i64,

    #[serde(default)]
    pub completed: bool,
}

/// Validated `{question, option}` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnswerChoice {
    pub question_id: Uuid,
    pub option_id: Uuid,
}

/// Typed command for the attempt engine.
#[derive(Debug, Clone)]
pub struct SubmitAttempt {
    pub student_id: Uuid,
    pub quiz_id: Uuid,
    pub answers: Vec<AnswerChoice>,
    pub self_reported_score: Option<f64>,
    pub duration_seconds: i64,
    pub completed: bool,
}

impl SubmitAttempt {
    /// First question id that appears more than once in the submission.
    pub fn duplicate_question(&self) -> Option<Uuid> {
        let mut seen = HashSet::with_capacity(self.answers.len());
        self.answers
            .iter()
            .map(|a| a.question_id)
            .find(|q| !seen.insert(*q))
    }
}

impl TryFrom<SubmitAttemptRequest> for SubmitAttempt {
    type Error = AppError;

    /// All-or-nothing: one malformed answer rejects the submission.
    fn try_from(req: SubmitAttemptRequest) -> Result<Self, Self::Error> {
        req.validate()?;

        let answers = req
            .answers
            .iter()
            .enumerate()
            .map(|(i, a)| {
                Ok(AnswerChoice {
                    question_id: parse_id(&format!("answers[{}].question_id", i), &a.question_id)?,
                    option_id: parse_id(&format!("answers[{}].option_id", i), &a.option_id)?,
                })
            })
            .collect::<Result<Vec<_>, AppError>>()?;

        Ok(SubmitAttempt {
            student_id: parse_id("student_id", &req.student_id)?,
            quiz_id: parse_id("quiz_id", &req.quiz_id)?,
            answers,
            self_reported_score: req.score.map(|s| check_percent("score", s)).transpose()?,
            duration_seconds: check_non_negative("duration_seconds", req.duration_seconds)?,
            completed: req.completed,
        })
    }
}

/// Attempt header plus answers, ready to be committed as one unit.
#[derive(Debug, Clone)]
pub struct NewAttempt {
    pub attempt: QuizAttempt,
    pub answers: Vec<Answer>,
}
