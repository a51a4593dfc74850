// src/store/postgres.rs

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        attempt::{Answer, AnswerDetail, NewAttempt, QuizAttempt, QuizAttemptSummary},
        progress::{ProgressKey, ProgressRecord, ProgressRow, ProgressWrite},
        quiz::{AnswerOption, Question, QuestionKind, QuestionWithOptions, Quiz, QuizDetail},
        user::{Role, User, UserRow},
    },
};

use super::{AttemptStore, CatalogStore, ProgressPlanner, ProgressStore, UserStore};

const PROGRESS_COLUMNS: &str = "id, student_id, course_id, status, percent, total_time_spent, last_accessed, created_at, updated_at";

const ATTEMPT_COLUMNS: &str = "id, student_id, quiz_id, submitted_at, score, duration_seconds, completed";

const USER_COLUMNS: &str = "id, email, name, password_hash, role, admin_rights, enrollment_date, last_login, created_at";

/// Helper struct for fetching questions; `kind` is stored as TEXT.
#[derive(sqlx::FromRow)]
struct QuestionRow {
    id: Uuid,
    quiz_id: Uuid,
    text: String,
    kind: String,
    points: i32,
    explanation: Option<String>,
}

impl From<QuestionRow> for Question {
    fn from(row: QuestionRow) -> Self {
        Question {
            id: row.id,
            quiz_id: row.quiz_id,
            text: row.text,
            kind: QuestionKind::from_db(&row.kind),
            points: row.points,
            explanation: row.explanation,
        }
    }
}

/// Postgres-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the embedded migrations.
    pub async fn migrate(&self) -> Result<(), AppError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::InternalServerError(e.to_string()))
    }
}

#[async_trait]
impl ProgressStore for PgStore {
    async fn find_progress(&self, key: ProgressKey) -> Result<Option<ProgressRecord>, AppError> {
        let sql = format!(
            "SELECT {} FROM progress WHERE student_id = $1 AND course_id = $2",
            PROGRESS_COLUMNS
        );
        sqlx::query_as::<_, ProgressRow>(&sql)
            .bind(key.student_id)
            .bind(key.course_id)
            .fetch_optional(&self.pool)
            .await?
            .map(ProgressRecord::try_from)
            .transpose()
    }

    async fn list_progress(&self, student_id: Uuid) -> Result<Vec<ProgressRecord>, AppError> {
        let sql = format!(
            "SELECT {} FROM progress WHERE student_id = $1 ORDER BY last_accessed DESC",
            PROGRESS_COLUMNS
        );
        sqlx::query_as::<_, ProgressRow>(&sql)
            .bind(student_id)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(ProgressRecord::try_from)
            .collect()
    }

    async fn apply_progress(
        &self,
        key: ProgressKey,
        plan: ProgressPlanner<'_>,
    ) -> Result<(ProgressRecord, bool), AppError> {
        let mut tx = self.pool.begin().await?;

        // Row lock serializes concurrent merges on the same key.
        let select = format!(
            "SELECT {} FROM progress WHERE student_id = $1 AND course_id = $2 FOR UPDATE",
            PROGRESS_COLUMNS
        );
        let existing = sqlx::query_as::<_, ProgressRow>(&select)
            .bind(key.student_id)
            .bind(key.course_id)
            .fetch_optional(&mut *tx)
            .await?
            .map(ProgressRecord::try_from)
            .transpose()?;

        let (row, created) = match plan(existing.as_ref()) {
            ProgressWrite::Insert(record) => {
                let insert = format!(
                    r#"
                    INSERT INTO progress
                        (id, student_id, course_id, status, percent, total_time_spent,
                         last_accessed, created_at, updated_at)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                    ON CONFLICT (student_id, course_id) DO NOTHING
                    RETURNING {}
                    "#,
                    PROGRESS_COLUMNS
                );
                let row = sqlx::query_as::<_, ProgressRow>(&insert)
                    .bind(record.id)
                    .bind(record.student_id)
                    .bind(record.course_id)
                    .bind(record.status.as_str())
                    .bind(record.percent)
                    .bind(record.total_time_spent)
                    .bind(record.last_accessed)
                    .bind(record.created_at)
                    .bind(record.updated_at)
                    .fetch_optional(&mut *tx)
                    .await?
                    // Another request inserted the key first; its row is not visible to our lock.
                    .ok_or_else(|| {
                        AppError::TransientStore("progress record created concurrently".to_string())
                    })?;
                (row, true)
            }
            ProgressWrite::Merge(merge) => {
                let update = format!(
                    r#"
                    UPDATE progress SET
                        percent = GREATEST(percent, COALESCE($3, percent)),
                        total_time_spent = total_time_spent + $4,
                        status = COALESCE($5, status),
                        last_accessed = $6,
                        updated_at = $6
                    WHERE student_id = $1 AND course_id = $2
                    RETURNING {}
                    "#,
                    PROGRESS_COLUMNS
                );
                let row = sqlx::query_as::<_, ProgressRow>(&update)
                    .bind(key.student_id)
                    .bind(key.course_id)
                    .bind(merge.percent_floor)
                    .bind(merge.time_increment)
                    .bind(merge.status.map(|s| s.as_str()))
                    .bind(merge.last_accessed)
                    .fetch_one(&mut *tx)
                    .await?;
                (row, false)
            }
        };

        tx.commit().await?;

        Ok((ProgressRecord::try_from(row)?, created))
    }
}

#[async_trait]
impl AttemptStore for PgStore {
    async fn insert_attempt(&self, new: NewAttempt) -> Result<QuizAttempt, AppError> {
        let mut tx = self.pool.begin().await?;

        let insert = format!(
            r#"
            INSERT INTO quiz_attempts
                (id, student_id, quiz_id, submitted_at, score, duration_seconds, completed)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            ATTEMPT_COLUMNS
        );
        let attempt = sqlx::query_as::<_, QuizAttempt>(&insert)
            .bind(new.attempt.id)
            .bind(new.attempt.student_id)
            .bind(new.attempt.quiz_id)
            .bind(new.attempt.submitted_at)
            .bind(new.attempt.score)
            .bind(new.attempt.duration_seconds)
            .bind(new.attempt.completed)
            .fetch_one(&mut *tx)
            .await?;

        if !new.answers.is_empty() {
            // One statement for all answers; the unique (attempt_id, question_id)
            // index aborts the whole transaction on a duplicate.
            let mut query_builder = QueryBuilder::<Postgres>::new(
                "INSERT INTO answers (id, attempt_id, question_id, option_id) ",
            );
            query_builder.push_values(&new.answers, |mut b, answer| {
                b.push_bind(answer.id)
                    .push_bind(answer.attempt_id)
                    .push_bind(answer.question_id)
                    .push_bind(answer.option_id);
            });
            query_builder.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;

        Ok(attempt)
    }

    async fn find_attempt(&self, attempt_id: Uuid) -> Result<Option<QuizAttempt>, AppError> {
        let sql = format!("SELECT {} FROM quiz_attempts WHERE id = $1", ATTEMPT_COLUMNS);
        Ok(sqlx::query_as::<_, QuizAttempt>(&sql)
            .bind(attempt_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_attempts(&self, student_id: Uuid) -> Result<Vec<QuizAttemptSummary>, AppError> {
        let list = sqlx::query_as::<_, QuizAttemptSummary>(
            r#"
            SELECT
                a.id, a.student_id, a.quiz_id, a.submitted_at, a.score,
                a.duration_seconds, a.completed,
                q.title AS quiz_title
            FROM quiz_attempts a
            LEFT JOIN quizzes q ON q.id = a.quiz_id
            WHERE a.student_id = $1
            ORDER BY a.submitted_at DESC
            "#,
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(list)
    }

    async fn stored_answers(&self, attempt_id: Uuid) -> Result<Vec<Answer>, AppError> {
        Ok(sqlx::query_as::<_, Answer>(
            "SELECT id, attempt_id, question_id, option_id FROM answers WHERE attempt_id = $1",
        )
        .bind(attempt_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn answer_details(&self, attempt_id: Uuid) -> Result<Vec<AnswerDetail>, AppError> {
        let details = sqlx::query_as::<_, AnswerDetail>(
            r#"
            SELECT
                r.question_id,
                q.text AS question_text,
                q.points,
                r.option_id,
                o.text AS option_text,
                o.is_correct
            FROM answers r
            LEFT JOIN questions q ON q.id = r.question_id
            LEFT JOIN options o ON o.id = r.option_id
            WHERE r.attempt_id = $1
            ORDER BY q.position
            "#,
        )
        .bind(attempt_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch answers for attempt {}: {:?}", attempt_id, e);
            AppError::from(e)
        })?;

        Ok(details)
    }
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn list_quizzes(&self, course_id: Option<Uuid>) -> Result<Vec<Quiz>, AppError> {
        Ok(sqlx::query_as::<_, Quiz>(
            r#"
            SELECT id, course_id, title, time_limit_minutes
            FROM quizzes
            WHERE ($1::UUID IS NULL OR course_id = $1)
            ORDER BY title
            "#,
        )
        .bind(course_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn quiz_detail(&self, quiz_id: Uuid) -> Result<Option<QuizDetail>, AppError> {
        let Some(quiz) = sqlx::query_as::<_, Quiz>(
            "SELECT id, course_id, title, time_limit_minutes FROM quizzes WHERE id = $1",
        )
        .bind(quiz_id)
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let questions: Vec<Question> = sqlx::query_as::<_, QuestionRow>(
            r#"
            SELECT id, quiz_id, text, kind, points, explanation
            FROM questions
            WHERE quiz_id = $1
            ORDER BY position, id
            "#,
        )
        .bind(quiz_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Question::from)
        .collect();

        let question_ids: Vec<Uuid> = questions.iter().map(|q| q.id).collect();

        let options = sqlx::query_as::<_, AnswerOption>(
            r#"
            SELECT id, question_id, text, is_correct
            FROM options
            WHERE question_id = ANY($1)
            ORDER BY position, id
            "#,
        )
        .bind(&question_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_question: HashMap<Uuid, Vec<AnswerOption>> = HashMap::new();
        for option in options {
            by_question.entry(option.question_id).or_default().push(option);
        }

        let questions = questions
            .into_iter()
            .map(|question| QuestionWithOptions {
                options: by_question.remove(&question.id).unwrap_or_default(),
                question,
            })
            .collect();

        Ok(Some(QuizDetail { quiz, questions }))
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {} FROM users WHERE LOWER(email) = LOWER($1)", USER_COLUMNS);
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn insert_user(&self, user: &User) -> Result<(), AppError> {
        let (rights, enrollment_date, last_login) = match &user.role {
            Role::Admin { rights } => (rights.clone(), None, None),
            Role::Student {
                enrollment_date,
                last_login,
            } => (Vec::new(), Some(*enrollment_date), *last_login),
        };

        sqlx::query(
            r#"
            INSERT INTO users
                (id, email, name, password_hash, role, admin_rights,
                 enrollment_date, last_login, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(user.role.name())
        .bind(rights)
        .bind(enrollment_date)
        .bind(last_login)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::Conflict(_) => {
                AppError::Conflict(format!("Email '{}' already registered", user.email))
            }
            other => other,
        })?;

        Ok(())
    }

    async fn record_login(&self, user_id: Uuid, at: DateTime<Utc>) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET last_login = $1 WHERE id = $2 AND role = 'student'")
            .bind(at)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
