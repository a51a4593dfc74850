// src/services/attempt.rs

//! Quiz attempts and scoring.

use std::collections::HashMap;

use chrono::Utc;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        attempt::{
            Answer, AnswerChoice, AnswerDetail, NewAttempt, QuizAttempt, QuizAttemptSummary,
            ScoreBreakdown, SubmitAttempt,
        },
        quiz::{AnswerKey, Quiz, QuizDetail},
    },
    store::{AttemptStore, CatalogStore},
};

/// Answer key of every question in the quiz, by question id.
pub fn answer_keys(detail: &QuizDetail) -> HashMap<Uuid, AnswerKey> {
    detail
        .questions
        .iter()
        .map(|q| (q.question.id, AnswerKey::from_question(q)))
        .collect()
}

/// Weighted score of a set of answers.
///
/// Every resolvable answer adds its question's points to the total; correct
/// ones add them to the earned points too. Answers whose question or option
/// is unknown are ignored.
pub fn score_answers<'a, I>(answers: I, keys: &HashMap<Uuid, AnswerKey>) -> ScoreBreakdown
where
    I: IntoIterator<Item = &'a AnswerChoice>,
{
    let mut earned_points: i64 = 0;
    let mut total_points: i64 = 0;
    let mut correct_count = 0;
    let mut answered_count = 0;

    for answer in answers {
        let Some(key) = keys.get(&answer.question_id) else {
            continue;
        };
        let Some(&is_correct) = key.options.get(&answer.option_id) else {
            continue;
        };
        answered_count += 1;
        total_points += i64::from(key.points);
        if is_correct {
            earned_points += i64::from(key.points);
            correct_count += 1;
        }
    }

    let score = if total_points > 0 {
        (earned_points as f64 / total_points as f64) * 100.0
    } else {
        0.0
    };

    ScoreBreakdown {
        earned_points,
        total_points,
        correct_count,
        answered_count,
        score,
    }
}

fn is_resolvable(answer: &AnswerChoice, keys: &HashMap<Uuid, AnswerKey>) -> bool {
    keys.get(&answer.question_id)
        .is_some_and(|k| k.options.contains_key(&answer.option_id))
}

/// Keeps the answers that reference a question of this quiz and one of that
/// question's options. In strict mode any other answer rejects the attempt.
fn resolve_answers(
    answers: Vec<AnswerChoice>,
    keys: &HashMap<Uuid, AnswerKey>,
    strict: bool,
) -> Result<Vec<AnswerChoice>, AppError> {
    let (resolved, unresolved): (Vec<_>, Vec<_>) =
        answers.into_iter().partition(|a| is_resolvable(a, keys));

    if let Some(first) = unresolved.first() {
        if strict {
            return Err(AppError::Conflict(format!(
                "Answer references unknown question {} or option {}",
                first.question_id, first.option_id
            )));
        }
        tracing::warn!(
            "Dropping {} answer(s) with unknown question/option references",
            unresolved.len()
        );
    }

    Ok(resolved)
}

/// Records one attempt: header and answers are committed together with the
/// server-computed score, or nothing is.
pub async fn submit_attempt<S>(store: &S, cmd: SubmitAttempt, strict: bool) -> Result<QuizAttempt, AppError>
where
    S: AttemptStore + CatalogStore + ?Sized,
{
    if let Some(question_id) = cmd.duplicate_question() {
        return Err(AppError::Conflict(format!(
            "Question {} is answered more than once in this attempt",
            question_id
        )));
    }

    let detail = store
        .quiz_detail(cmd.quiz_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Quiz {} not found", cmd.quiz_id)))?;

    let keys = answer_keys(&detail);
    let answers = resolve_answers(cmd.answers, &keys, strict)?;
    let breakdown = score_answers(&answers, &keys);

    if let Some(claimed) = cmd.self_reported_score {
        if (claimed - breakdown.score).abs() > f64::EPSILON {
            tracing::warn!(
                student_id = %cmd.student_id,
                quiz_id = %cmd.quiz_id,
                "Client-reported score {} replaced by computed score {}",
                claimed,
                breakdown.score
            );
        }
    }

    let attempt_id = Uuid::new_v4();
    let attempt = QuizAttempt {
        id: attempt_id,
        student_id: cmd.student_id,
        quiz_id: cmd.quiz_id,
        submitted_at: Utc::now(),
        score: breakdown.score,
        duration_seconds: cmd.duration_seconds,
        completed: cmd.completed,
    };
    let answers = answers
        .into_iter()
        .map(|a| Answer {
            id: Uuid::new_v4(),
            attempt_id,
            question_id: a.question_id,
            option_id: a.option_id,
        })
        .collect();

    let stored = store.insert_attempt(NewAttempt { attempt, answers }).await?;

    tracing::info!(
        attempt_id = %stored.id,
        student_id = %stored.student_id,
        quiz_id = %stored.quiz_id,
        score = stored.score,
        earned = breakdown.earned_points,
        total = breakdown.total_points,
        "Quiz attempt recorded"
    );

    Ok(stored)
}

/// Re-derives an attempt's score from its stored answers and the current
/// question data. Read-only.
pub async fn replay_score<S>(store: &S, attempt: &QuizAttempt) -> Result<ScoreBreakdown, AppError>
where
    S: AttemptStore + CatalogStore + ?Sized,
{
    let stored = store.stored_answers(attempt.id).await?;
    let keys = store
        .quiz_detail(attempt.quiz_id)
        .await?
        .map(|d| answer_keys(&d))
        .unwrap_or_default();

    let choices: Vec<AnswerChoice> = stored
        .iter()
        .map(|a| AnswerChoice {
            question_id: a.question_id,
            option_id: a.option_id,
        })
        .collect();

    Ok(score_answers(&choices, &keys))
}

pub async fn find_attempt<S>(store: &S, attempt_id: Uuid) -> Result<QuizAttempt, AppError>
where
    S: AttemptStore + ?Sized,
{
    store
        .find_attempt(attempt_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Attempt {} not found", attempt_id)))
}

pub async fn list_attempts<S>(store: &S, student_id: Uuid) -> Result<Vec<QuizAttemptSummary>, AppError>
where
    S: AttemptStore + ?Sized,
{
    store.list_attempts(student_id).await
}

pub async fn attempt_answers<S>(store: &S, attempt_id: Uuid) -> Result<Vec<AnswerDetail>, AppError>
where
    S: AttemptStore + ?Sized,
{
    store.answer_details(attempt_id).await
}

/// Quiz with questions and options assembled, for the quiz page.
pub async fn quiz_detail<S>(store: &S, quiz_id: Uuid) -> Result<QuizDetail, AppError>
where
    S: CatalogStore + ?Sized,
{
    store
        .quiz_detail(quiz_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Quiz {} not found", quiz_id)))
}

pub async fn list_quizzes<S>(store: &S, course_id: Option<Uuid>) -> Result<Vec<Quiz>, AppError>
where
    S: CatalogStore + ?Sized,
{
    store.list_quizzes(course_id).await
}
