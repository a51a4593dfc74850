// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{attempt, auth, progress, quiz},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware},
};

/// Assembles the main application router.
///
/// * Auth routes are public; everything else requires a bearer token.
/// * Admin routes additionally require the admin role.
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    let progress_routes = Router::new()
        .route("/user/{student_id}", get(progress::get_user_progress))
        .route(
            "/user/{student_id}/course/{course_id}",
            get(progress::get_user_course_progress).post(progress::update_user_course_progress),
        )
        .route("/quiz-attempt", post(attempt::submit_attempt))
        .route(
            "/quiz-attempt/user/{student_id}",
            get(attempt::list_user_attempts),
        )
        .route(
            "/quiz-attempt/{attempt_id}/answers",
            get(attempt::get_attempt_answers),
        );

    let quiz_routes = Router::new()
        .route("/", get(quiz::list_quizzes))
        .route("/{quiz_id}", get(quiz::get_quiz));

    let admin_routes = Router::new()
        .route(
            "/quiz-attempts/{attempt_id}/score",
            get(attempt::get_attempt_score),
        )
        // Auth first, then the admin check
        .route_layer(middleware::from_fn(admin_middleware));

    let protected = Router::new()
        .nest("/api/progress", progress_routes)
        .nest("/api/quizzes", quiz_routes)
        .nest("/api/admin", admin_routes)
        .route_layer(middleware::from_fn_with_state(
            state.config.clone(),
            auth_middleware,
        ));

    Router::new()
        .nest("/api/auth", auth_routes)
        .merge(protected)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
