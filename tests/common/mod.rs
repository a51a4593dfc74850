// tests/common/mod.rs

#![allow(dead_code)]

use std::sync::Arc;

use lms_backend::{
    config::Config,
    models::{course::Course, quiz::QuizDetail, user::User},
    routes,
    seed::seed_demo_catalog,
    state::AppState,
    store::{MemoryStore, SharedStore},
    utils::jwt::{ROLE_ADMIN, ROLE_STUDENT, sign_claims},
};
use uuid::Uuid;

pub const JWT_SECRET: &str = "test_secret_for_integration_tests";

pub struct TestApp {
    pub address: String,
    pub store: Arc<MemoryStore>,
    pub course: Course,
    pub quiz: QuizDetail,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    /// Adds a student account to the store and returns its id.
    pub fn register_student(&self) -> Uuid {
        let email = format!("{}@example.com", Uuid::new_v4().simple());
        let student = User::new_student(&email, "Student", String::new());
        let id = student.id;
        self.store
            .insert_user_record(student)
            .expect("Failed to register student");
        id
    }

    pub fn student_token(&self, student_id: Uuid) -> String {
        sign_claims(student_id, ROLE_STUDENT, JWT_SECRET, 600).expect("Failed to sign token")
    }

    pub fn admin_token(&self) -> String {
        sign_claims(Uuid::new_v4(), ROLE_ADMIN, JWT_SECRET, 600).expect("Failed to sign token")
    }

    /// (question id, correct option id, a wrong option id) for every question of the demo quiz.
    pub fn answer_sheet(&self) -> Vec<(Uuid, Uuid, Uuid)> {
        self.quiz
            .questions
            .iter()
            .map(|q| {
                let correct = q.options.iter().find(|o| o.is_correct).expect("no correct option");
                let wrong = q.options.iter().find(|o| !o.is_correct).expect("no wrong option");
                (q.question.id, correct.id, wrong.id)
            })
            .collect()
    }
}

/// Spawns the app on a random port, backed by a fresh in-memory store
/// holding the demo catalog.
pub async fn spawn_app() -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let (course, quiz) = seed_demo_catalog(&store).expect("Failed to seed catalog");

    let config = Config {
        database_url: None,
        jwt_secret: JWT_SECRET.to_string(),
        jwt_expiration: 600, // 10 minutes for tests
        rust_log: "error".to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
        cors_origins: vec!["http://localhost:3000".to_string()],
        admin_email: None,
        admin_password: None,
        strict_answer_references: true,
    };

    let shared: SharedStore = store.clone();
    let app = routes::create_router(AppState {
        store: shared,
        config,
    });

    // Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        store,
        course,
        quiz,
    }
}
