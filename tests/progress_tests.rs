// tests/progress_tests.rs

mod common;

use common::spawn_app;
use serde_json::{Value, json};
use uuid::Uuid;

#[tokio::test]
async fn progress_is_created_then_merged() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let student = app.register_student();
    let token = app.student_token(student);
    let path = format!("/api/progress/user/{}/course/{}", student, app.course.id);

    // 1. First report creates the record
    let created = client
        .post(app.url(&path))
        .bearer_auth(&token)
        .json(&json!({ "percent": 40 }))
        .send()
        .await
        .unwrap();
    assert_eq!(created.status().as_u16(), 201);
    let body: Value = created.json().await.unwrap();
    assert_eq!(body["data"]["status"], "InProgress");
    assert_eq!(body["data"]["percent"], 40.0);
    assert_eq!(body["data"]["total_time_spent"], 0);

    // 2. Lower percent never regresses, time accumulates
    let merged = client
        .post(app.url(&path))
        .bearer_auth(&token)
        .json(&json!({ "percent": 20, "totalTimeSpentDelta": 300 }))
        .send()
        .await
        .unwrap();
    assert_eq!(merged.status().as_u16(), 200);
    let body: Value = merged.json().await.unwrap();
    assert_eq!(body["data"]["percent"], 40.0);
    assert_eq!(body["data"]["total_time_spent"], 300);
    assert_eq!(body["data"]["status"], "InProgress");

    // 3. Read back
    let read: Value = client
        .get(app.url(&path))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(read["data"]["total_time_spent"], 300);
}

#[tokio::test]
async fn full_percent_completes_the_course() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let student = app.register_student();

    let response = client
        .post(app.url(&format!(
            "/api/progress/user/{}/course/{}",
            student, app.course.id
        )))
        .bearer_auth(app.student_token(student))
        .json(&json!({ "percent": 100, "total_time_spent_delta": 10000 }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 201);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["status"], "Completed");
    // One report counts for at most two hours
    assert_eq!(body["data"]["total_time_spent"], 7200);
}

#[tokio::test]
async fn localized_status_label_is_accepted() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let student = app.register_student();

    let response = client
        .post(app.url(&format!(
            "/api/progress/user/{}/course/{}",
            student, app.course.id
        )))
        .bearer_auth(app.student_token(student))
        .json(&json!({ "status": "Terminé", "percent": 60 }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 201);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["status"], "Completed");
}

#[tokio::test]
async fn missing_progress_reads_as_null() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let student = app.register_student();

    let response = client
        .get(app.url(&format!(
            "/api/progress/user/{}/course/{}",
            student, app.course.id
        )))
        .bearer_auth(app.student_token(student))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert!(body["data"].is_null());
}

#[tokio::test]
async fn invalid_input_is_rejected_without_writes() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let student = app.register_student();
    let token = app.student_token(student);

    let bad_id = client
        .post(app.url(&format!(
            "/api/progress/user/{}/course/not-a-uuid",
            student
        )))
        .bearer_auth(&token)
        .json(&json!({ "percent": 10 }))
        .send()
        .await
        .unwrap();
    assert_eq!(bad_id.status().as_u16(), 400);

    let bad_percent = client
        .post(app.url(&format!(
            "/api/progress/user/{}/course/{}",
            student, app.course.id
        )))
        .bearer_auth(&token)
        .json(&json!({ "percent": 140 }))
        .send()
        .await
        .unwrap();
    assert_eq!(bad_percent.status().as_u16(), 400);

    let bad_status = client
        .post(app.url(&format!(
            "/api/progress/user/{}/course/{}",
            student, app.course.id
        )))
        .bearer_auth(&token)
        .json(&json!({ "status": "Paused" }))
        .send()
        .await
        .unwrap();
    assert_eq!(bad_status.status().as_u16(), 400);

    let list: Value = client
        .get(app.url(&format!("/api/progress/user/{}", student)))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list["count"], 0);
}

#[tokio::test]
async fn unknown_course_is_not_found() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let student = app.register_student();

    let response = client
        .post(app.url(&format!(
            "/api/progress/user/{}/course/{}",
            student,
            Uuid::new_v4()
        )))
        .bearer_auth(app.student_token(student))
        .json(&json!({ "percent": 10 }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn unregistered_student_is_not_found() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    // Valid token, but no account behind it
    let ghost = Uuid::new_v4();

    let response = client
        .post(app.url(&format!(
            "/api/progress/user/{}/course/{}",
            ghost, app.course.id
        )))
        .bearer_auth(app.student_token(ghost))
        .json(&json!({ "percent": 10 }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn students_cannot_touch_other_students_progress() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let me = app.register_student();
    let other = app.register_student();

    let response = client
        .post(app.url(&format!(
            "/api/progress/user/{}/course/{}",
            other, app.course.id
        )))
        .bearer_auth(app.student_token(me))
        .json(&json!({ "percent": 90 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);

    // Admins may act on anyone
    let response = client
        .post(app.url(&format!(
            "/api/progress/user/{}/course/{}",
            other, app.course.id
        )))
        .bearer_auth(app.admin_token())
        .json(&json!({ "percent": 90 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);
}

#[tokio::test]
async fn concurrent_reports_all_land() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let student = app.register_student();
    let token = app.student_token(student);
    let url = app.url(&format!(
        "/api/progress/user/{}/course/{}",
        student, app.course.id
    ));

    let mut handles = Vec::new();
    for i in 1..=10 {
        let client = client.clone();
        let url = url.clone();
        let token = token.clone();
        handles.push(tokio::spawn(async move {
            client
                .post(&url)
                .bearer_auth(token)
                .json(&json!({ "percent": i * 10, "total_time_spent_delta": 60 }))
                .send()
                .await
                .unwrap()
                .status()
                .as_u16()
        }));
    }

    let mut created = 0;
    for handle in handles {
        let status = handle.await.unwrap();
        assert!(status == 200 || status == 201, "unexpected status {}", status);
        if status == 201 {
            created += 1;
        }
    }
    assert_eq!(created, 1);

    let body: Value = client
        .get(&url)
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["data"]["percent"], 100.0);
    assert_eq!(body["data"]["total_time_spent"], 600);
    assert_eq!(body["data"]["status"], "Completed");
}
