// src/store/mod.rs

//! Persistence collaborators. The engines only see these traits; `PgStore`
//! backs them with Postgres and `MemoryStore` keeps everything in process.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        attempt::{Answer, AnswerDetail, NewAttempt, QuizAttempt, QuizAttemptSummary},
        progress::{ProgressKey, ProgressRecord, ProgressWrite},
        quiz::{Quiz, QuizDetail},
        user::User,
    },
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Decides the write for a key given the record currently stored under it.
pub type ProgressPlanner<'a> = &'a (dyn Fn(Option<&ProgressRecord>) -> ProgressWrite + Send + Sync);

#[async_trait]
pub trait ProgressStore: Send + Sync {
    async fn find_progress(&self, key: ProgressKey) -> Result<Option<ProgressRecord>, AppError>;

    /// Most recently accessed first.
    async fn list_progress(&self, student_id: Uuid) -> Result<Vec<ProgressRecord>, AppError>;

    /// Reads the record for `key` under an exclusive scope, asks `plan` for
    /// the write and applies it atomically. Returns the stored record and
    /// whether it was created.
    ///
    /// A concurrent first insert on the same key surfaces as
    /// `AppError::TransientStore` so the caller can re-run the plan.
    async fn apply_progress(
        &self,
        key: ProgressKey,
        plan: ProgressPlanner<'_>,
    ) -> Result<(ProgressRecord, bool), AppError>;
}

#[async_trait]
pub trait AttemptStore: Send + Sync {
    /// Commits the header and every answer in one transaction.
    async fn insert_attempt(&self, new: NewAttempt) -> Result<QuizAttempt, AppError>;

    async fn find_attempt(&self, attempt_id: Uuid) -> Result<Option<QuizAttempt>, AppError>;

    /// Newest first.
    async fn list_attempts(&self, student_id: Uuid) -> Result<Vec<QuizAttemptSummary>, AppError>;

    async fn stored_answers(&self, attempt_id: Uuid) -> Result<Vec<Answer>, AppError>;

    async fn answer_details(&self, attempt_id: Uuid) -> Result<Vec<AnswerDetail>, AppError>;
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn list_quizzes(&self, course_id: Option<Uuid>) -> Result<Vec<Quiz>, AppError>;

    /// Quiz with its questions and options, in display order.
    async fn quiz_detail(&self, quiz_id: Uuid) -> Result<Option<QuizDetail>, AppError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    /// Fails with `AppError::Conflict` when the email is taken.
    async fn insert_user(&self, user: &User) -> Result<(), AppError>;

    async fn record_login(&self, user_id: Uuid, at: DateTime<Utc>) -> Result<(), AppError>;
}

/// Everything the HTTP layer needs from persistence.
pub trait Store: ProgressStore + AttemptStore + CatalogStore + UserStore {}

impl<T> Store for T where T: ProgressStore + AttemptStore + CatalogStore + UserStore {}

pub type SharedStore = Arc<dyn Store>;
