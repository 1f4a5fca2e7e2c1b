use chrono::{DateTime, Utc};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub phone: Option<String>,
    // Absent for OAuth-only accounts
    pub password_hash: Option<String>,
    pub failed_login_attempts: i32,
    pub locked_until: Option<DateTime<Utc>>,
    pub email_verified: bool,
    pub email_verified_at: Option<DateTime<Utc>>,
    pub email_verification_token: Option<String>,
    pub email_verification_expiry: Option<DateTime<Utc>>,
    pub password_reset_token: Option<String>,
    pub password_reset_expiry: Option<DateTime<Utc>>,
    pub two_factor_enabled: bool,
    // Set during enrollment before two_factor_enabled flips true
    pub two_factor_secret: Option<String>,
    pub google_id: Option<String>,
    pub microsoft_id: Option<String>,
    pub apple_id: Option<String>,
    pub is_active: bool,
    pub is_suspended: bool,
    pub suspension_reason: Option<String>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub last_login_ip: Option<String>,
    pub notify_email: bool,
    pub notify_sms: bool,
    pub notify_marketing: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn has_password(&self) -> bool {
        self.password_hash.is_some()
    }

    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|until| until > now)
    }

    /// Loginable: not soft-deleted, active, and not suspended.
    pub fn is_available(&self) -> bool {
        self.is_active && !self.is_suspended && self.deleted_at.is_none()
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub refresh_token: String,
    pub user_agent: Option<String>,
    pub ip: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct BackupCode {
    pub id: String,
    pub user_id: String,
    pub code_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Append-only security event. Writes are best-effort and never block the
/// primary flow.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub user_id: Option<String>,
    pub action: String,
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl AuditEntry {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            user_id: None,
            action: action.into(),
            entity_type: None,
            entity_id: None,
            ip: None,
            user_agent: None,
            metadata: None,
        }
    }

    pub fn user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// The finite provider set; each maps to a statically-known column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OAuthProvider {
    Google,
    Microsoft,
    Apple,
}

impl OAuthProvider {
    pub fn provider_id<'a>(self, user: &'a User) -> Option<&'a str> {
        match self {
            Self::Google => user.google_id.as_deref(),
            Self::Microsoft => user.microsoft_id.as_deref(),
            Self::Apple => user.apple_id.as_deref(),
        }
    }
}

impl fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Google => "google",
            Self::Microsoft => "microsoft",
            Self::Apple => "apple",
        };
        f.write_str(name)
    }
}

impl FromStr for OAuthProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "google" => Ok(Self::Google),
            "microsoft" => Ok(Self::Microsoft),
            "apple" => Ok(Self::Apple),
            _ => Err(()),
        }
    }
}
