// src/models/quiz.rs

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;

/// Represents the 'quizzes' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Quiz {
    pub id: Uuid,
    pub course_id: Option<Uuid>,
    pub title: String,
    pub time_limit_minutes: Option<i32>,
}

/// Question type: 'single' (single choice) or 'multiple' (multiple choice).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    #[serde(alias = "single")]
    SingleChoice,
    #[serde(alias = "multiple")]
    MultipleChoice,
}

impl QuestionKind {
    /// Parses the 'kind' column of the 'questions' table.
    pub fn from_db(raw: &str) -> Self {
        match raw {
            "multiple" => QuestionKind::MultipleChoice,
            _ => QuestionKind::SingleChoice,
        }
    }
}

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: Uuid,
    pub quiz_id: Uuid,
    pub text: String,
    pub kind: QuestionKind,

    /// Weight of the question in the quiz score.
    pub points: i32,

    /// Explanation of the correct answer.
    pub explanation: Option<String>,
}

/// Represents the 'options' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AnswerOption {
    pub id: Uuid,
    pub question_id: Uuid,
    pub text: String,
    pub is_correct: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionWithOptions {
    #[serde(flatten)]
    pub question: Question,
    pub options: Vec<AnswerOption>,
}

/// A quiz with its questions and their options, assembled in one read.
#[derive(Debug, Clone, Serialize)]
pub struct QuizDetail {
    #[serde(flatten)]
    pub quiz: Quiz,
    pub questions: Vec<QuestionWithOptions>,
}

/// DTO for sending an option to a student (correctness hidden).
#[derive(Debug, Serialize)]
pub struct PublicOption {
    pub id: Uuid,
    pub text: String,
}

/// DTO for sending a question to a student (explanation hidden).
#[derive(Debug, Serialize)]
pub struct PublicQuestion {
    pub id: Uuid,
    pub text: String,
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    pub points: i32,
    pub options: Vec<PublicOption>,
}

#[derive(Debug, Serialize)]
pub struct PublicQuizDetail {
    pub id: Uuid,
    pub course_id: Option<Uuid>,
    pub title: String,
    pub time_limit_minutes: Option<i32>,
    pub questions: Vec<PublicQuestion>,
}

impl From<QuizDetail> for PublicQuizDetail {
    fn from(detail: QuizDetail) -> Self {
        PublicQuizDetail {
            id: detail.quiz.id,
            course_id: detail.quiz.course_id,
            title: detail.quiz.title,
            time_limit_minutes: detail.quiz.time_limit_minutes,
            questions: detail
                .questions
                .into_iter()
                .map(|q| PublicQuestion {
                    id: q.question.id,
                    text: q.question.text,
                    kind: q.question.kind,
                    points: q.question.points,
                    options: q
                        .options
                        .into_iter()
                        .map(|o| PublicOption { id: o.id, text: o.text })
                        .collect(),
                })
                .collect(),
        }
    }
}

/// Scoring data for one question: its weight and the correctness of each option.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerKey {
    pub points: i32,
    pub options: HashMap<Uuid, bool>,
}

impl AnswerKey {
    pub fn from_question(question: &QuestionWithOptions) -> Self {
        AnswerKey {
            points: question.question.points,
            options: question
                .options
                .iter()
                .map(|o| (o.id, o.is_correct))
                .collect(),
        }
    }
}

/// Query parameters for listing quizzes.
#[derive(Debug, Deserialize)]
pub struct QuizListParams {
    pub course_id: Option<Uuid>,
}
