use axum_test::TestServer;
use serde_json::json;
use sqlx::{MySql, Pool};
use std::sync::Arc;

use debtrescue_api::services::jwt::JwtService;
use debtrescue_api::services::mailer::{LogMailer, Mailer};

// Allow dead_code for utilities used by other test files
#[allow(dead_code)]
pub struct TestContext {
    pub server: TestServer,
    pub db: Pool<MySql>,
}

#[allow(dead_code)]
impl TestContext {
    pub async fn new() -> Self {
        dotenvy::dotenv().ok();

        let database_url = std::env::var("TEST_DATABASE_URL")
            .unwrap_or_else(|_| std::env::var("DATABASE_URL").expect("DATABASE_URL must be set"));

        let db = sqlx::mysql::MySqlPoolOptions::new()
            .max_connections(5)
            .connect(&database_url)
            .await
            .expect("Failed to connect to test database");

        sqlx::migrate!("./migrations")
            .run(&db)
            .await
            .expect("Failed to run migrations");

        let jwt_service = JwtService::new(test_jwt_secret());

        let mailer: Arc<dyn Mailer> = Arc::new(LogMailer);

        let app = debtrescue_api::create_app(
            db.clone(),
            jwt_service,
            mailer,
            "DebtRescue.AI Test".to_string(),
        )
        .await;
        let server = TestServer::new(app).expect("Failed to create test server");

        Self { server, db }
    }

    pub async fn cleanup(&self) {
        // Clean up test data after each test
        sqlx::query("DELETE FROM sessions").execute(&self.db).await.ok();
        sqlx::query("DELETE FROM backup_codes")
            .execute(&self.db)
            .await
            .ok();
        sqlx::query("DELETE FROM audit_logs")
            .execute(&self.db)
            .await
            .ok();
        sqlx::query("DELETE FROM users").execute(&self.db).await.ok();
    }

    /// Signup and return (access_token, refresh_token).
    pub async fn signup(&self, email: &str) -> (String, String) {
        let response = self
            .server
            .post("/auth/signup")
            .json(&json!({
                "email": email,
                "password": test_password()
            }))
            .await;

        let body: serde_json::Value = response.json();
        (
            body["data"]["access_token"].as_str().unwrap().to_string(),
            body["data"]["refresh_token"].as_str().unwrap().to_string(),
        )
    }

    /// Password login and return (access_token, refresh_token).
    pub async fn login(&self, email: &str) -> (String, String) {
        let response = self
            .server
            .post("/auth/login")
            .json(&json!({
                "email": email,
                "password": test_password()
            }))
            .await;

        let body: serde_json::Value = response.json();
        (
            body["data"]["access_token"].as_str().unwrap().to_string(),
            body["data"]["refresh_token"].as_str().unwrap().to_string(),
        )
    }
}

#[allow(dead_code)]
pub fn test_jwt_secret() -> String {
    std::env::var("JWT_SECRET").unwrap_or_else(|_| "test-secret-key-for-testing-only".to_string())
}

// Helper to generate unique test email
#[allow(dead_code)]
pub fn test_email() -> String {
    format!("test_{}@example.com", uuid::Uuid::new_v4())
}

// Helper to generate test password that satisfies the strength policy
#[allow(dead_code)]
pub fn test_password() -> &'static str {
    "Str0ng!Secret42"
}

#[allow(dead_code)]
pub fn other_password() -> &'static str {
    "An0ther!Secret7"
}
