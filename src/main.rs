use std::sync::Arc;

use debtrescue_api::config::{environment::Config, init_db};
use debtrescue_api::services::jwt::JwtService;
use debtrescue_api::services::mailer::{LogMailer, Mailer, SmtpMailer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "debtrescue_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().expect("Failed to load environment configuration");

    let db = init_db(&config.database_url).await;
    tracing::info!("Connected to MySQL");

    sqlx::migrate!("./migrations")
        .run(&db)
        .await
        .expect("Failed to run migrations");

    let jwt_service = JwtService::new(config.jwt_secret.clone());

    let mailer: Arc<dyn Mailer> = match &config.smtp {
        Some(smtp) => Arc::new(
            SmtpMailer::new(smtp, config.frontend_url.clone())
                .expect("Failed to build SMTP mailer"),
        ),
        None => {
            tracing::warn!("SMTP not configured; outbound email will be logged only");
            Arc::new(LogMailer)
        }
    };

    let app =
        debtrescue_api::create_app(db, jwt_service, mailer, config.totp_issuer.clone()).await;

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
    tracing::info!("Server running on http://localhost:3000");
    axum::serve(listener, app).await.unwrap();
}
