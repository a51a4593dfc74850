// src/seed.rs

use chrono::Utc;
use uuid::Uuid;

use crate::{
    config::Config,
    error::AppError,
    models::{
        course::Course,
        quiz::{AnswerOption, Question, QuestionKind, QuestionWithOptions, Quiz, QuizDetail},
        user::{Role, User},
    },
    store::{MemoryStore, UserStore},
    utils::hash::hash_password,
};

/// Rights granted to the seeded administrator.
pub const DEFAULT_ADMIN_RIGHTS: [&str; 2] = ["manage_catalog", "view_reports"];

/// Creates the admin account from `ADMIN_EMAIL` / `ADMIN_PASSWORD` if it does not exist yet.
pub async fn seed_admin<S>(store: &S, config: &Config) -> Result<(), AppError>
where
    S: UserStore + ?Sized,
{
    let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) else {
        return Ok(());
    };

    if store.find_user_by_email(email).await?.is_some() {
        return Ok(());
    }

    tracing::info!("Seeding admin user: {}", email);
    let admin = User {
        id: Uuid::new_v4(),
        email: email.trim().to_lowercase(),
        name: "Administrator".to_string(),
        password_hash: hash_password(password)?,
        role: Role::Admin {
            rights: DEFAULT_ADMIN_RIGHTS.iter().map(|r| r.to_string()).collect(),
        },
        created_at: Utc::now(),
    };
    store.insert_user(&admin).await?;
    tracing::info!("Admin user created successfully.");

    Ok(())
}

fn single_choice(quiz_id: Uuid, text: &str, points: i32, options: &[(&str, bool)]) -> QuestionWithOptions {
    let id = Uuid::new_v4();
    QuestionWithOptions {
        question: Question {
            id,
            quiz_id,
            text: text.to_string(),
            kind: QuestionKind::SingleChoice,
            points,
            explanation: None,
        },
        options: options
            .iter()
            .map(|(text, is_correct)| AnswerOption {
                id: Uuid::new_v4(),
                question_id: id,
                text: text.to_string(),
                is_correct: *is_correct,
            })
            .collect(),
    }
}

/// A small networking course with one weighted quiz, used when running
/// without a database and by the integration tests.
pub fn demo_catalog() -> (Course, QuizDetail) {
    let course = Course {
        id: Uuid::new_v4(),
        title: "Networking fundamentals".to_string(),
    };
    let quiz_id = Uuid::new_v4();
    let quiz = QuizDetail {
        quiz: Quiz {
            id: quiz_id,
            course_id: Some(course.id),
            title: "IPv4 addressing".to_string(),
            time_limit_minutes: Some(20),
        },
        questions: vec![
            single_choice(
                quiz_id,
                "Which class does 10.0.0.1 belong to?",
                1,
                &[("Class A", true), ("Class B", false), ("Class C", false)],
            ),
            single_choice(
                quiz_id,
                "How many usable hosts does a /30 network have?",
                1,
                &[("2", true), ("4", false)],
            ),
            single_choice(
                quiz_id,
                "What is the default mask of a class C network?",
                2,
                &[("255.255.255.0", true), ("255.255.0.0", false)],
            ),
        ],
    };
    (course, quiz)
}

/// Loads the demo catalog into an in-memory store.
pub fn seed_demo_catalog(store: &MemoryStore) -> Result<(Course, QuizDetail), AppError> {
    let (course, quiz) = demo_catalog();
    store.insert_course(course.clone())?;
    store.insert_quiz(quiz.clone())?;
    tracing::info!(course_id = %course.id, quiz_id = %quiz.quiz.id, "Demo catalog loaded");
    Ok((course, quiz))
}
