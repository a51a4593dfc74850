// src/store/memory.rs

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        attempt::{Answer, AnswerDetail, NewAttempt, QuizAttempt, QuizAttemptSummary},
        course::Course,
        progress::{ProgressKey, ProgressRecord, ProgressWrite},
        quiz::{Quiz, QuizDetail},
        user::{Role, User},
    },
};

use super::{AttemptStore, CatalogStore, ProgressPlanner, ProgressStore, UserStore};

#[derive(Default)]
struct State {
    courses: HashMap<Uuid, Course>,
    quizzes: HashMap<Uuid, QuizDetail>,
    progress: HashMap<ProgressKey, ProgressRecord>,
    attempts: Vec<QuizAttempt>,
    answers: Vec<Answer>,
    users: HashMap<Uuid, User>,
}

impl State {
    /// Same rule as the `users` foreign keys in Postgres.
    fn ensure_user(&self, user_id: Uuid) -> Result<(), AppError> {
        if self.users.contains_key(&user_id) {
            Ok(())
        } else {
            Err(AppError::NotFound(format!("User {} not found", user_id)))
        }
    }
}

/// In-process store. A single lock gives every operation the isolation the
/// Postgres store gets from transactions.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, AppError> {
        self.state
            .lock()
            .map_err(|_| AppError::InternalServerError("memory store lock poisoned".to_string()))
    }

    pub fn insert_course(&self, course: Course) -> Result<(), AppError> {
        self.lock()?.courses.insert(course.id, course);
        Ok(())
    }

    /// Registers a quiz together with its questions and options.
    pub fn insert_quiz(&self, detail: QuizDetail) -> Result<(), AppError> {
        let mut state = self.lock()?;
        if let Some(course_id) = detail.quiz.course_id {
            if !state.courses.contains_key(&course_id) {
                return Err(AppError::NotFound(format!("Course {} not found", course_id)));
            }
        }
        state.quizzes.insert(detail.quiz.id, detail);
        Ok(())
    }

    /// Registers a user account directly, bypassing password hashing.
    pub fn insert_user_record(&self, user: User) -> Result<(), AppError> {
        let mut state = self.lock()?;
        if state
            .users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(&user.email))
        {
            return Err(AppError::Conflict(format!(
                "Email '{}' already registered",
                user.email
            )));
        }
        state.users.insert(user.id, user);
        Ok(())
    }

    pub fn attempt_count(&self) -> Result<usize, AppError> {
        Ok(self.lock()?.attempts.len())
    }

    pub fn answer_count(&self) -> Result<usize, AppError> {
        Ok(self.lock()?.answers.len())
    }
}

#[async_trait]
impl ProgressStore for MemoryStore {
    async fn find_progress(&self, key: ProgressKey) -> Result<Option<ProgressRecord>, AppError> {
        Ok(self.lock()?.progress.get(&key).cloned())
    }

    async fn list_progress(&self, student_id: Uuid) -> Result<Vec<ProgressRecord>, AppError> {
        let state = self.lock()?;
        let mut list: Vec<ProgressRecord> = state
            .progress
            .values()
            .filter(|p| p.student_id == student_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.last_accessed.cmp(&a.last_accessed));
        Ok(list)
    }

    async fn apply_progress(
        &self,
        key: ProgressKey,
        plan: ProgressPlanner<'_>,
    ) -> Result<(ProgressRecord, bool), AppError> {
        let mut state = self.lock()?;

        if !state.courses.contains_key(&key.course_id) {
            return Err(AppError::NotFound(format!("Course {} not found", key.course_id)));
        }
        state.ensure_user(key.student_id)?;

        match plan(state.progress.get(&key)) {
            ProgressWrite::Insert(record) => {
                if state.progress.contains_key(&key) {
                    return Err(AppError::TransientStore(
                        "progress record created concurrently".to_string(),
                    ));
                }
                state.progress.insert(key, record.clone());
                Ok((record, true))
            }
            ProgressWrite::Merge(merge) => {
                let record = state.progress.get_mut(&key).ok_or_else(|| {
                    AppError::TransientStore("progress record vanished during merge".to_string())
                })?;
                merge.apply_to(record);
                Ok((record.clone(), false))
            }
        }
    }
}

#[async_trait]
impl AttemptStore for MemoryStore {
    async fn insert_attempt(&self, new: NewAttempt) -> Result<QuizAttempt, AppError> {
        let mut state = self.lock()?;

        let quiz = state
            .quizzes
            .get(&new.attempt.quiz_id)
            .ok_or_else(|| AppError::NotFound(format!("Quiz {} not found", new.attempt.quiz_id)))?;
        state.ensure_user(new.attempt.student_id)?;

        // Check every constraint before touching state so a failure leaves nothing behind.
        let mut answered = std::collections::HashSet::new();
        for answer in &new.answers {
            if !answered.insert(answer.question_id) {
                return Err(AppError::Conflict(format!(
                    "Question {} answered more than once in attempt {}",
                    answer.question_id, answer.attempt_id
                )));
            }
            let question = quiz
                .questions
                .iter()
                .find(|q| q.question.id == answer.question_id)
                .ok_or_else(|| {
                    AppError::NotFound(format!("Question {} does not exist", answer.question_id))
                })?;
            if !question.options.iter().any(|o| o.id == answer.option_id) {
                return Err(AppError::NotFound(format!(
                    "Option {} does not exist",
                    answer.option_id
                )));
            }
        }

        state.attempts.push(new.attempt.clone());
        state.answers.extend(new.answers);
        Ok(new.attempt)
    }

    async fn find_attempt(&self, attempt_id: Uuid) -> Result<Option<QuizAttempt>, AppError> {
        Ok(self
            .lock()?
            .attempts
            .iter()
            .find(|a| a.id == attempt_id)
            .cloned())
    }

    async fn list_attempts(&self, student_id: Uuid) -> Result<Vec<QuizAttemptSummary>, AppError> {
        let state = self.lock()?;
        let mut list: Vec<QuizAttemptSummary> = state
            .attempts
            .iter()
            .filter(|a| a.student_id == student_id)
            .map(|a| QuizAttemptSummary {
                attempt: a.clone(),
                quiz_title: state.quizzes.get(&a.quiz_id).map(|q| q.quiz.title.clone()),
            })
            .collect();
        list.sort_by(|a, b| b.attempt.submitted_at.cmp(&a.attempt.submitted_at));
        Ok(list)
    }

    async fn stored_answers(&self, attempt_id: Uuid) -> Result<Vec<Answer>, AppError> {
        Ok(self
            .lock()?
            .answers
            .iter()
            .filter(|a| a.attempt_id == attempt_id)
            .cloned()
            .collect())
    }

    async fn answer_details(&self, attempt_id: Uuid) -> Result<Vec<AnswerDetail>, AppError> {
        let state = self.lock()?;
        let quiz = state
            .attempts
            .iter()
            .find(|a| a.id == attempt_id)
            .and_then(|a| state.quizzes.get(&a.quiz_id));

        Ok(state
            .answers
            .iter()
            .filter(|a| a.attempt_id == attempt_id)
            .map(|a| {
                let question = quiz.and_then(|q| {
                    q.questions.iter().find(|q| q.question.id == a.question_id)
                });
                let option = question.and_then(|q| q.options.iter().find(|o| o.id == a.option_id));
                AnswerDetail {
                    question_id: a.question_id,
                    question_text: question.map(|q| q.question.text.clone()),
                    points: question.map(|q| q.question.points),
                    option_id: a.option_id,
                    option_text: option.map(|o| o.text.clone()),
                    is_correct: option.map(|o| o.is_correct),
                }
            })
            .collect())
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn list_quizzes(&self, course_id: Option<Uuid>) -> Result<Vec<Quiz>, AppError> {
        let state = self.lock()?;
        let mut list: Vec<Quiz> = state
            .quizzes
            .values()
            .filter(|d| course_id.is_none() || d.quiz.course_id == course_id)
            .map(|d| d.quiz.clone())
            .collect();
        list.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(list)
    }

    async fn quiz_detail(&self, quiz_id: Uuid) -> Result<Option<QuizDetail>, AppError> {
        Ok(self.lock()?.quizzes.get(&quiz_id).cloned())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self
            .lock()?
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn insert_user(&self, user: &User) -> Result<(), AppError> {
        self.insert_user_record(user.clone())
    }

    async fn record_login(&self, user_id: Uuid, at: DateTime<Utc>) -> Result<(), AppError> {
        let mut state = self.lock()?;
        let user = state
            .users
            .get_mut(&user_id)
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
        if let Role::Student { last_login, .. } = &mut user.role {
            *last_login = Some(at);
        }
        Ok(())
    }
}
