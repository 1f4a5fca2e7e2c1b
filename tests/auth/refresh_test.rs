use axum::http::StatusCode;
use serde_json::json;
use serial_test::serial;

use crate::common::{test_email, TestContext};

#[tokio::test]
#[serial]
async fn refresh_returns_a_usable_access_token() {
    let ctx = TestContext::new().await;
    let email = test_email();
    let (_, refresh_token) = ctx.signup(&email).await;

    let response = ctx
        .server
        .post("/auth/refresh")
        .json(&json!({ "refresh_token": refresh_token }))
        .await;

    response.assert_status(StatusCode::OK);
    let body: serde_json::Value = response.json();
    let access_token = body["data"]["access_token"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["token_type"], "Bearer");
    assert_eq!(body["data"]["expires_in"], 900);

    let me = ctx
        .server
        .get("/auth/me")
        .authorization_bearer(&access_token)
        .await;
    me.assert_status(StatusCode::OK);

    ctx.cleanup().await;
}

#[tokio::test]
#[serial]
async fn refresh_without_a_token_is_unauthorized() {
    let ctx = TestContext::new().await;

    let response = ctx.server.post("/auth/refresh").json(&json!({})).await;
    response.assert_status(StatusCode::UNAUTHORIZED);

    ctx.cleanup().await;
}

#[tokio::test]
#[serial]
async fn refresh_with_garbage_token_is_unauthorized() {
    let ctx = TestContext::new().await;

    let response = ctx
        .server
        .post("/auth/refresh")
        .json(&json!({ "refresh_token": "garbage" }))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);

    ctx.cleanup().await;
}

#[tokio::test]
#[serial]
async fn access_token_is_not_accepted_as_a_refresh_token() {
    let ctx = TestContext::new().await;
    let email = test_email();
    let (access_token, _) = ctx.signup(&email).await;

    let response = ctx
        .server
        .post("/auth/refresh")
        .json(&json!({ "refresh_token": access_token }))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);

    ctx.cleanup().await;
}

#[tokio::test]
#[serial]
async fn expired_session_is_rejected_and_deleted() {
    let ctx = TestContext::new().await;
    let email = test_email();
    let (_, refresh_token) = ctx.signup(&email).await;

    sqlx::query(
        "UPDATE sessions SET expires_at = DATE_SUB(NOW(6), INTERVAL 1 DAY) WHERE refresh_token = ?",
    )
    .bind(&refresh_token)
    .execute(&ctx.db)
    .await
    .unwrap();

    let response = ctx
        .server
        .post("/auth/refresh")
        .json(&json!({ "refresh_token": &refresh_token }))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);

    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM sessions WHERE refresh_token = ?")
            .bind(&refresh_token)
            .fetch_one(&ctx.db)
            .await
            .unwrap();
    assert_eq!(count, 0);

    ctx.cleanup().await;
}

#[tokio::test]
#[serial]
async fn refresh_touches_last_used_at_without_rotating_the_token() {
    let ctx = TestContext::new().await;
    let email = test_email();
    let (_, refresh_token) = ctx.signup(&email).await;

    ctx.server
        .post("/auth/refresh")
        .json(&json!({ "refresh_token": &refresh_token }))
        .await
        .assert_status(StatusCode::OK);

    let (last_used_at,): (Option<chrono::DateTime<chrono::Utc>>,) =
        sqlx::query_as("SELECT last_used_at FROM sessions WHERE refresh_token = ?")
            .bind(&refresh_token)
            .fetch_one(&ctx.db)
            .await
            .unwrap();
    assert!(last_used_at.is_some());

    // The same refresh token keeps working
    ctx.server
        .post("/auth/refresh")
        .json(&json!({ "refresh_token": &refresh_token }))
        .await
        .assert_status(StatusCode::OK);

    ctx.cleanup().await;
}

#[tokio::test]
#[serial]
async fn refresh_for_a_suspended_user_is_rejected() {
    let ctx = TestContext::new().await;
    let email = test_email();
    let (_, refresh_token) = ctx.signup(&email).await;

    sqlx::query("UPDATE users SET is_suspended = TRUE WHERE email = ?")
        .bind(&email)
        .execute(&ctx.db)
        .await
        .unwrap();

    let response = ctx
        .server
        .post("/auth/refresh")
        .json(&json!({ "refresh_token": refresh_token }))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);

    ctx.cleanup().await;
}
