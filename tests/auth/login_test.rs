use axum::http::StatusCode;
use serde_json::json;
use serial_test::serial;

use crate::common::{other_password, test_email, test_password, TestContext};

#[tokio::test]
#[serial]
async fn login_with_valid_credentials_returns_tokens() {
    let ctx = TestContext::new().await;
    let email = test_email();
    ctx.signup(&email).await;

    let response = ctx
        .server
        .post("/auth/login")
        .json(&json!({
            "email": &email,
            "password": test_password()
        }))
        .await;

    response.assert_status(StatusCode::OK);
    let body: serde_json::Value = response.json();
    assert_eq!(body["success"], true);
    assert!(body["data"]["access_token"].is_string());
    assert!(body["data"]["refresh_token"].is_string());
    assert_eq!(body["data"]["token_type"], "Bearer");
    assert_eq!(body["data"]["user"]["email"], email);

    ctx.cleanup().await;
}

#[tokio::test]
#[serial]
async fn login_wrong_password_and_unknown_email_return_identical_message() {
    let ctx = TestContext::new().await;
    let email = test_email();
    ctx.signup(&email).await;

    let wrong_password = ctx
        .server
        .post("/auth/login")
        .json(&json!({
            "email": &email,
            "password": other_password()
        }))
        .await;
    wrong_password.assert_status(StatusCode::UNAUTHORIZED);

    let unknown_email = ctx
        .server
        .post("/auth/login")
        .json(&json!({
            "email": test_email(),
            "password": test_password()
        }))
        .await;
    unknown_email.assert_status(StatusCode::UNAUTHORIZED);

    // No account-existence oracle: both failures read the same
    let a: serde_json::Value = wrong_password.json();
    let b: serde_json::Value = unknown_email.json();
    assert_eq!(a["error"]["message"], b["error"]["message"]);
    assert_eq!(a["error"]["message"], "Invalid email or password");

    ctx.cleanup().await;
}

#[tokio::test]
#[serial]
async fn fifth_failed_attempt_locks_the_account() {
    let ctx = TestContext::new().await;
    let email = test_email();
    ctx.signup(&email).await;

    for attempt in 1..=5 {
        let response = ctx
            .server
            .post("/auth/login")
            .json(&json!({
                "email": &email,
                "password": other_password()
            }))
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);

        let body: serde_json::Value = response.json();
        if attempt < 5 {
            assert_eq!(body["error"]["message"], "Invalid email or password");
        } else {
            assert_eq!(
                body["error"]["message"],
                "Too many failed attempts. Account locked for 15 minutes"
            );
        }
    }

    let (locked_until,): (Option<chrono::DateTime<chrono::Utc>>,) =
        sqlx::query_as("SELECT locked_until FROM users WHERE email = ?")
            .bind(&email)
            .fetch_one(&ctx.db)
            .await
            .unwrap();
    assert!(locked_until.unwrap() > chrono::Utc::now());

    ctx.cleanup().await;
}

#[tokio::test]
#[serial]
async fn locked_account_rejects_even_the_correct_password() {
    let ctx = TestContext::new().await;
    let email = test_email();
    ctx.signup(&email).await;

    for _ in 0..5 {
        ctx.server
            .post("/auth/login")
            .json(&json!({
                "email": &email,
                "password": other_password()
            }))
            .await;
    }

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
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .starts_with("Account locked."));

    ctx.cleanup().await;
}

#[tokio::test]
#[serial]
async fn login_succeeds_again_once_the_lock_expires() {
    let ctx = TestContext::new().await;
    let email = test_email();
    ctx.signup(&email).await;

    for _ in 0..5 {
        ctx.server
            .post("/auth/login")
            .json(&json!({
                "email": &email,
                "password": other_password()
            }))
            .await;
    }

    // Simulate the lock window passing
    sqlx::query("UPDATE users SET locked_until = DATE_SUB(NOW(6), INTERVAL 1 MINUTE) WHERE email = ?")
        .bind(&email)
        .execute(&ctx.db)
        .await
        .unwrap();

    let response = ctx
        .server
        .post("/auth/login")
        .json(&json!({
            "email": &email,
            "password": test_password()
        }))
        .await;
    response.assert_status(StatusCode::OK);

    ctx.cleanup().await;
}

#[tokio::test]
#[serial]
async fn successful_login_resets_the_failure_counter() {
    let ctx = TestContext::new().await;
    let email = test_email();
    ctx.signup(&email).await;

    for _ in 0..3 {
        ctx.server
            .post("/auth/login")
            .json(&json!({
                "email": &email,
                "password": other_password()
            }))
            .await;
    }

    ctx.login(&email).await;

    let (attempts, locked_until): (i32, Option<chrono::DateTime<chrono::Utc>>) =
        sqlx::query_as("SELECT failed_login_attempts, locked_until FROM users WHERE email = ?")
            .bind(&email)
            .fetch_one(&ctx.db)
            .await
            .unwrap();
    assert_eq!(attempts, 0);
    assert!(locked_until.is_none());

    ctx.cleanup().await;
}

#[tokio::test]
#[serial]
async fn suspended_account_cannot_login() {
    let ctx = TestContext::new().await;
    let email = test_email();
    ctx.signup(&email).await;

    sqlx::query("UPDATE users SET is_suspended = TRUE, suspension_reason = 'fraud review' WHERE email = ?")
        .bind(&email)
        .execute(&ctx.db)
        .await
        .unwrap();

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
    assert_eq!(
        body["error"]["message"],
        "Account suspended: fraud review"
    );

    ctx.cleanup().await;
}

#[tokio::test]
#[serial]
async fn login_records_audit_entries() {
    let ctx = TestContext::new().await;
    let email = test_email();
    ctx.signup(&email).await;

    ctx.server
        .post("/auth/login")
        .json(&json!({
            "email": &email,
            "password": other_password()
        }))
        .await;
    ctx.login(&email).await;

    let (user_id,): (String,) = sqlx::query_as("SELECT id FROM users WHERE email = ?")
        .bind(&email)
        .fetch_one(&ctx.db)
        .await
        .unwrap();

    let (failed,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM audit_logs WHERE user_id = ? AND action = 'login_failed'",
    )
    .bind(&user_id)
    .fetch_one(&ctx.db)
    .await
    .unwrap();
    assert_eq!(failed, 1);

    let (succeeded,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM audit_logs WHERE user_id = ? AND action = 'login'")
            .bind(&user_id)
            .fetch_one(&ctx.db)
            .await
            .unwrap();
    assert_eq!(succeeded, 1);

    ctx.cleanup().await;
}
