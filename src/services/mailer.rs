use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

use crate::config::environment::SmtpConfig;

#[derive(Debug, thiserror::Error)]
pub enum MailerError {
    #[error("invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("message build failed: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("smtp transport failed: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
}

/// Outbound email port. Callers treat delivery as fire-and-forget: a
/// failed send is logged and never surfaces to the user-facing flow.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_verification(&self, to: &str, token: &str) -> Result<(), MailerError>;
    async fn send_password_reset(&self, to: &str, token: &str) -> Result<(), MailerError>;
}

/// Real SMTP delivery via lettre.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
    frontend_url: String,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig, frontend_url: String) -> Result<Self, MailerError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();

        Ok(Self {
            transport,
            from_address: config.from_address.clone(),
            frontend_url,
        })
    }

    async fn send(&self, to: &str, subject: &str, body: String) -> Result<(), MailerError> {
        let message = Message::builder()
            .from(self.from_address.parse()?)
            .to(to.parse()?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)?;

        self.transport.send(message).await?;
        Ok(())
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_verification(&self, to: &str, token: &str) -> Result<(), MailerError> {
        let link = format!("{}/verify-email?token={}", self.frontend_url, token);
        self.send(
            to,
            "Verify your email",
            format!(
                "Welcome to DebtRescue.AI!\n\n\
                 Confirm your email address by opening the link below within 24 hours:\n\n{link}\n"
            ),
        )
        .await
    }

    async fn send_password_reset(&self, to: &str, token: &str) -> Result<(), MailerError> {
        let link = format!("{}/reset-password?token={}", self.frontend_url, token);
        self.send(
            to,
            "Reset your password",
            format!(
                "A password reset was requested for your account.\n\n\
                 The link below is valid for one hour:\n\n{link}\n\n\
                 If you did not request this, you can ignore this email.\n"
            ),
        )
        .await
    }
}

/// Logs instead of sending. Used in development and tests.
#[derive(Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_verification(&self, to: &str, token: &str) -> Result<(), MailerError> {
        info!(to = %to, token = %token, "verification email (not sent, log mailer)");
        Ok(())
    }

    async fn send_password_reset(&self, to: &str, token: &str) -> Result<(), MailerError> {
        info!(to = %to, token = %token, "password reset email (not sent, log mailer)");
        Ok(())
    }
}
