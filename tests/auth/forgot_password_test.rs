use axum::http::StatusCode;
use serde_json::json;
use serial_test::serial;

use crate::common::{test_email, TestContext};

#[tokio::test]
#[serial]
async fn forgot_password_sets_a_reset_token() {
    let ctx = TestContext::new().await;
    let email = test_email();
    ctx.signup(&email).await;

    let response = ctx
        .server
        .post("/auth/forgot-password")
        .json(&json!({ "email": &email }))
        .await;
    response.assert_status(StatusCode::OK);

    let (token, expiry): (Option<String>, Option<chrono::DateTime<chrono::Utc>>) =
        sqlx::query_as(
            "SELECT password_reset_token, password_reset_expiry FROM users WHERE email = ?",
        )
        .bind(&email)
        .fetch_one(&ctx.db)
        .await
        .unwrap();
    assert!(token.is_some());
    assert!(expiry.unwrap() > chrono::Utc::now());

    ctx.cleanup().await;
}

#[tokio::test]
#[serial]
async fn responses_for_known_and_unknown_emails_are_byte_identical() {
    let ctx = TestContext::new().await;
    let email = test_email();
    ctx.signup(&email).await;

    let known = ctx
        .server
        .post("/auth/forgot-password")
        .json(&json!({ "email": &email }))
        .await;
    let unknown = ctx
        .server
        .post("/auth/forgot-password")
        .json(&json!({ "email": test_email() }))
        .await;

    known.assert_status(StatusCode::OK);
    unknown.assert_status(StatusCode::OK);
    assert_eq!(known.text(), unknown.text());

    let body: serde_json::Value = known.json();
    assert_eq!(
        body["message"],
        "If an account with that email exists, password reset instructions have been sent."
    );

    ctx.cleanup().await;
}

#[tokio::test]
#[serial]
async fn repeat_request_rotates_the_token() {
    let ctx = TestContext::new().await;
    let email = test_email();
    ctx.signup(&email).await;

    ctx.server
        .post("/auth/forgot-password")
        .json(&json!({ "email": &email }))
        .await;
    let (first,): (Option<String>,) =
        sqlx::query_as("SELECT password_reset_token FROM users WHERE email = ?")
            .bind(&email)
            .fetch_one(&ctx.db)
            .await
            .unwrap();

    ctx.server
        .post("/auth/forgot-password")
        .json(&json!({ "email": &email }))
        .await;
    let (second,): (Option<String>,) =
        sqlx::query_as("SELECT password_reset_token FROM users WHERE email = ?")
            .bind(&email)
            .fetch_one(&ctx.db)
            .await
            .unwrap();

    assert_ne!(first, second);

    ctx.cleanup().await;
}
