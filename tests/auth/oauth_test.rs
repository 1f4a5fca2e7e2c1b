use axum::http::StatusCode;
use serde_json::json;
use serial_test::serial;

use crate::common::{test_email, test_password, TestContext};

#[tokio::test]
#[serial]
async fn first_google_login_creates_a_verified_account() {
    let ctx = TestContext::new().await;
    let email = test_email();

    let response = ctx
        .server
        .post("/auth/oauth/google")
        .json(&json!({
            "provider_id": "google-sub-12345",
            "email": &email,
            "name": "OAuth User"
        }))
        .await;
    response.assert_status(StatusCode::OK);

    let body: serde_json::Value = response.json();
    assert_eq!(body["data"]["is_new_user"], true);
    assert_eq!(body["data"]["user"]["email"], email);
    assert_eq!(body["data"]["user"]["email_verified"], true);
    assert!(body["data"]["access_token"].is_string());

    let (google_id, password_hash): (Option<String>, Option<String>) =
        sqlx::query_as("SELECT google_id, password_hash FROM users WHERE email = ?")
            .bind(&email)
            .fetch_one(&ctx.db)
            .await
            .unwrap();
    assert_eq!(google_id.as_deref(), Some("google-sub-12345"));
    assert!(password_hash.is_none());

    ctx.cleanup().await;
}

#[tokio::test]
#[serial]
async fn returning_oauth_user_is_not_flagged_as_new() {
    let ctx = TestContext::new().await;
    let email = test_email();

    for expected_new in [true, false] {
        let response = ctx
            .server
            .post("/auth/oauth/google")
            .json(&json!({
                "provider_id": "google-sub-67890",
                "email": &email
            }))
            .await;
        response.assert_status(StatusCode::OK);
        let body: serde_json::Value = response.json();
        assert_eq!(body["data"]["is_new_user"], expected_new);
    }

    // Still a single account
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE email = ?")
        .bind(&email)
        .fetch_one(&ctx.db)
        .await
        .unwrap();
    assert_eq!(count, 1);

    ctx.cleanup().await;
}

#[tokio::test]
#[serial]
async fn oauth_links_to_an_existing_password_account_by_email() {
    let ctx = TestContext::new().await;
    let email = test_email();
    ctx.signup(&email).await;

    let response = ctx
        .server
        .post("/auth/oauth/microsoft")
        .json(&json!({
            "provider_id": "ms-oid-123",
            "email": &email
        }))
        .await;
    response.assert_status(StatusCode::OK);
    let body: serde_json::Value = response.json();
    assert_eq!(body["data"]["is_new_user"], false);

    let (microsoft_id, password_hash): (Option<String>, Option<String>) =
        sqlx::query_as("SELECT microsoft_id, password_hash FROM users WHERE email = ?")
            .bind(&email)
            .fetch_one(&ctx.db)
            .await
            .unwrap();
    assert_eq!(microsoft_id.as_deref(), Some("ms-oid-123"));
    // Linking must not clobber the password
    assert!(password_hash.is_some());

    // Both login paths now work
    ctx.login(&email).await;

    ctx.cleanup().await;
}

#[tokio::test]
#[serial]
async fn unsupported_provider_is_rejected() {
    let ctx = TestContext::new().await;

    let response = ctx
        .server
        .post("/auth/oauth/facebook")
        .json(&json!({
            "provider_id": "fb-123",
            "email": test_email()
        }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["message"], "Unsupported OAuth provider");

    ctx.cleanup().await;
}

#[tokio::test]
#[serial]
async fn oauth_only_account_cannot_password_login() {
    let ctx = TestContext::new().await;
    let email = test_email();

    ctx.server
        .post("/auth/oauth/apple")
        .json(&json!({
            "provider_id": "apple-sub-1",
            "email": &email
        }))
        .await
        .assert_status(StatusCode::OK);

    let response = ctx
        .server
        .post("/auth/login")
        .json(&json!({
            "email": &email,
            "password": test_password()
        }))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = response.json();
    // Same generic message; no hint that the account is passwordless
    assert_eq!(body["error"]["message"], "Invalid email or password");

    ctx.cleanup().await;
}

#[tokio::test]
#[serial]
async fn suspended_account_cannot_oauth_login() {
    let ctx = TestContext::new().await;
    let email = test_email();

    ctx.server
        .post("/auth/oauth/google")
        .json(&json!({
            "provider_id": "google-sub-suspended",
            "email": &email
        }))
        .await
        .assert_status(StatusCode::OK);

    sqlx::query("UPDATE users SET is_suspended = TRUE WHERE email = ?")
        .bind(&email)
        .execute(&ctx.db)
        .await
        .unwrap();

    let response = ctx
        .server
        .post("/auth/oauth/google")
        .json(&json!({
            "provider_id": "google-sub-suspended",
            "email": &email
        }))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);

    ctx.cleanup().await;
}
