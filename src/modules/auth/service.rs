use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::config::DbPool;
use crate::error::ApiError;
use crate::modules::auth::crud::{
    AuditLogCrud, BackupCodeCrud, SessionCrud, UserCrud, MAX_FAILED_ATTEMPTS,
};
use crate::modules::auth::model::{AuditEntry, OAuthProvider, Session, User};
use crate::services::mailer::Mailer;
use crate::services::{hashing, jwt::JwtService, tokens, totp, validation};
use crate::AppState;

const LOCKOUT_MINUTES: i64 = 15;
const VERIFICATION_TOKEN_HOURS: i64 = 24;
const RESET_TOKEN_HOURS: i64 = 1;

const INVALID_CREDENTIALS: &str = "Invalid email or password";

// Anti-enumeration: these messages are returned verbatim whether or not
// the email corresponds to an account.
pub const GENERIC_RESET_MESSAGE: &str =
    "If an account with that email exists, password reset instructions have been sent.";
pub const GENERIC_VERIFICATION_MESSAGE: &str =
    "If an account with that email exists, a verification email has been sent.";

#[derive(Debug, Clone, Default)]
pub struct ClientMeta {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug)]
pub struct SignupInput {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug)]
pub struct OAuthInput {
    pub provider: OAuthProvider,
    pub provider_id: String,
    pub email: String,
    pub name: Option<String>,
}

#[derive(Debug)]
pub struct AuthSuccess {
    pub user: User,
    pub session_id: String,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
}

#[derive(Debug)]
pub enum LoginOutcome {
    Success(Box<AuthSuccess>),
    /// Password was correct but a second factor is still owed. Not an
    /// error, and no tokens are issued.
    TwoFactorRequired { user_id: String },
}

#[derive(Debug)]
pub struct TwoFactorSetup {
    pub secret: String,
    pub otpauth_url: String,
}

#[derive(Debug)]
pub struct RefreshedAccess {
    pub access_token: String,
    pub expires_in: i64,
}

pub struct AuthService {
    db: DbPool,
    jwt: JwtService,
    mailer: Arc<dyn Mailer>,
    totp_issuer: String,
}

impl AuthService {
    pub fn new(db: DbPool, jwt: JwtService, mailer: Arc<dyn Mailer>, totp_issuer: String) -> Self {
        Self {
            db,
            jwt,
            mailer,
            totp_issuer,
        }
    }

    pub fn from_state(state: &AppState) -> Self {
        Self::new(
            state.db.clone(),
            state.jwt_service.clone(),
            state.mailer.clone(),
            state.totp_issuer.clone(),
        )
    }

    fn users(&self) -> UserCrud {
        UserCrud::new(self.db.clone())
    }

    fn sessions(&self) -> SessionCrud {
        SessionCrud::new(self.db.clone())
    }

    fn backup_codes(&self) -> BackupCodeCrud {
        BackupCodeCrud::new(self.db.clone())
    }

    /// Best-effort audit write. A logging outage must never fail the
    /// operation being logged.
    async fn audit(&self, entry: AuditEntry, meta: &ClientMeta) {
        let mut entry = entry;
        entry.ip = meta.ip.clone();
        entry.user_agent = meta.user_agent.clone();

        if let Err(e) = AuditLogCrud::new(self.db.clone()).insert(&entry).await {
            tracing::warn!(action = %entry.action, error = %e, "audit log write failed");
        }
    }

    fn send_verification_email(&self, email: String, token: String) {
        let mailer = self.mailer.clone();
        tokio::spawn(async move {
            if let Err(e) = mailer.send_verification(&email, &token).await {
                tracing::warn!(to = %email, error = %e, "verification email failed");
            }
        });
    }

    fn send_password_reset_email(&self, email: String, token: String) {
        let mailer = self.mailer.clone();
        tokio::spawn(async move {
            if let Err(e) = mailer.send_password_reset(&email, &token).await {
                tracing::warn!(to = %email, error = %e, "password reset email failed");
            }
        });
    }

    /// One new session per login event; existing sessions are untouched.
    async fn issue_session(&self, user: &User, meta: &ClientMeta) -> Result<AuthSuccess, ApiError> {
        let session_id = Uuid::new_v4().to_string();

        let refresh_token = self
            .jwt
            .create_refresh_token(&user.id, &user.email, &session_id)
            .map_err(|e| ApiError::internal(e.to_string()))?;

        let access_token = self
            .jwt
            .create_access_token(&user.id, &user.email, Some(&session_id))
            .map_err(|e| ApiError::internal(e.to_string()))?;

        let now = Utc::now();
        let session = Session {
            id: session_id.clone(),
            user_id: user.id.clone(),
            refresh_token: refresh_token.clone(),
            user_agent: meta.user_agent.clone(),
            ip: meta.ip.clone(),
            expires_at: now + self.jwt.get_refresh_token_duration(),
            last_used_at: None,
            created_at: now,
        };
        self.sessions().create(&session).await?;

        Ok(AuthSuccess {
            user: user.clone(),
            session_id,
            access_token,
            refresh_token,
            expires_in: self.jwt.get_access_token_duration_secs(),
        })
    }

    pub async fn signup(
        &self,
        input: SignupInput,
        meta: &ClientMeta,
    ) -> Result<AuthSuccess, ApiError> {
        let email = validation::normalize_email(&input.email);
        validation::validate_email(&email)?;
        validation::validate_password_strength(&input.password)?;

        if self.users().find_by_email(&email).await?.is_some() {
            return Err(ApiError::conflict("Email already registered"));
        }

        let password_hash = hashing::hash_password_async(input.password).await?;

        let verification_token = tokens::generate_token();
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4().to_string(),
            email: email.clone(),
            name: input.name,
            phone: input.phone,
            password_hash: Some(password_hash),
            failed_login_attempts: 0,
            locked_until: None,
            email_verified: false,
            email_verified_at: None,
            email_verification_token: Some(verification_token.clone()),
            email_verification_expiry: Some(now + Duration::hours(VERIFICATION_TOKEN_HOURS)),
            password_reset_token: None,
            password_reset_expiry: None,
            two_factor_enabled: false,
            two_factor_secret: None,
            google_id: None,
            microsoft_id: None,
            apple_id: None,
            is_active: true,
            is_suspended: false,
            suspension_reason: None,
            deleted_at: None,
            last_login_at: Some(now),
            last_login_ip: meta.ip.clone(),
            notify_email: true,
            notify_sms: false,
            notify_marketing: false,
            created_at: now,
            updated_at: now,
        };

        if let Err(e) = self.users().create(&user).await {
            // Unique-index race: two signups for the same email
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_unique_violation() {
                    return Err(ApiError::conflict("Email already registered"));
                }
            }
            return Err(e.into());
        }

        self.audit(AuditEntry::new("signup").user(&user.id), meta)
            .await;

        // Signup never blocks on email delivery
        self.send_verification_email(email, verification_token);

        self.issue_session(&user, meta).await
    }

    pub async fn login(
        &self,
        email: &str,
        password: &str,
        two_factor_code: Option<&str>,
        meta: &ClientMeta,
    ) -> Result<LoginOutcome, ApiError> {
        let email = validation::normalize_email(email);

        let Some(user) = self.users().find_by_email(&email).await? else {
            // Identical message to the wrong-password case; no actor
            self.audit(
                AuditEntry::new("login_failed")
                    .metadata(serde_json::json!({ "reason": "unknown_email" })),
                meta,
            )
            .await;
            return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
        };

        if user.is_suspended {
            let reason = user
                .suspension_reason
                .as_deref()
                .unwrap_or("contact support");
            return Err(ApiError::unauthorized(format!(
                "Account suspended: {reason}"
            )));
        }

        let now = Utc::now();
        if user.is_locked(now) {
            let remaining = user
                .locked_until
                .map(|until| (until - now).num_minutes() + 1)
                .unwrap_or(LOCKOUT_MINUTES);
            // No password check while locked
            return Err(ApiError::unauthorized(format!(
                "Account locked. Try again in {remaining} minutes"
            )));
        }

        // An account without a password hash cannot password-login
        let Some(password_hash) = user.password_hash.clone() else {
            self.audit(
                AuditEntry::new("login_failed")
                    .user(&user.id)
                    .metadata(serde_json::json!({ "reason": "no_password" })),
                meta,
            )
            .await;
            return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
        };

        let password_ok =
            hashing::verify_password_async(password.to_string(), password_hash).await?;

        if !password_ok {
            let lock_until = now + Duration::minutes(LOCKOUT_MINUTES);
            let (attempts, _) = self
                .users()
                .record_login_failure(&user.id, lock_until)
                .await?;

            self.audit(
                AuditEntry::new("login_failed")
                    .user(&user.id)
                    .metadata(serde_json::json!({
                        "reason": "invalid_password",
                        "attempts": attempts,
                    })),
                meta,
            )
            .await;

            if attempts >= MAX_FAILED_ATTEMPTS {
                return Err(ApiError::unauthorized(format!(
                    "Too many failed attempts. Account locked for {LOCKOUT_MINUTES} minutes"
                )));
            }
            return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
        }

        if user.two_factor_enabled {
            let Some(code) = two_factor_code else {
                return Ok(LoginOutcome::TwoFactorRequired {
                    user_id: user.id.clone(),
                });
            };

            if !self.check_second_factor(&user, code).await? {
                self.audit(
                    AuditEntry::new("login_failed")
                        .user(&user.id)
                        .metadata(serde_json::json!({ "reason": "invalid_2fa" })),
                    meta,
                )
                .await;
                return Err(ApiError::unauthorized("Invalid two-factor code"));
            }
        }

        self.users()
            .record_login_success(&user.id, meta.ip.as_deref())
            .await?;

        self.audit(AuditEntry::new("login").user(&user.id), meta).await;

        let mut user = user;
        user.failed_login_attempts = 0;
        user.locked_until = None;
        user.last_login_at = Some(now);

        let success = self.issue_session(&user, meta).await?;
        Ok(LoginOutcome::Success(Box::new(success)))
    }

    /// TOTP first; on failure fall back to the stored backup-code hashes.
    /// A matching backup code is consumed atomically (single use).
    async fn check_second_factor(&self, user: &User, code: &str) -> Result<bool, ApiError> {
        if let Some(secret) = user.two_factor_secret.as_deref() {
            if totp::verify_code(secret, code)? {
                return Ok(true);
            }
        }

        let code_hash = tokens::hash_backup_code(code);
        Ok(self.backup_codes().consume(&user.id, &code_hash).await?)
    }

    pub async fn oauth_login(
        &self,
        input: OAuthInput,
        meta: &ClientMeta,
    ) -> Result<(AuthSuccess, bool), ApiError> {
        let email = validation::normalize_email(&input.email);

        let existing = match self
            .users()
            .find_by_provider(input.provider, &input.provider_id)
            .await?
        {
            Some(user) => Some(user),
            None => self.users().find_by_email(&email).await?,
        };

        let (user, is_new_user) = match existing {
            Some(mut user) => {
                if user.is_suspended {
                    return Err(ApiError::unauthorized("Account suspended"));
                }

                let is_new = user.last_login_at.is_none();

                // Backfill the provider link on first OAuth login
                if input.provider.provider_id(&user).is_none() {
                    self.users()
                        .link_provider(&user.id, input.provider, &input.provider_id)
                        .await?;
                }

                self.users()
                    .record_login_success(&user.id, meta.ip.as_deref())
                    .await?;
                user.last_login_at = Some(Utc::now());

                (user, is_new)
            }
            None => {
                let now = Utc::now();
                // OAuth identity is pre-trusted: verified, no password
                let mut user = User {
                    id: Uuid::new_v4().to_string(),
                    email: email.clone(),
                    name: input.name,
                    phone: None,
                    password_hash: None,
                    failed_login_attempts: 0,
                    locked_until: None,
                    email_verified: true,
                    email_verified_at: Some(now),
                    email_verification_token: None,
                    email_verification_expiry: None,
                    password_reset_token: None,
                    password_reset_expiry: None,
                    two_factor_enabled: false,
                    two_factor_secret: None,
                    google_id: None,
                    microsoft_id: None,
                    apple_id: None,
                    is_active: true,
                    is_suspended: false,
                    suspension_reason: None,
                    deleted_at: None,
                    last_login_at: Some(now),
                    last_login_ip: meta.ip.clone(),
                    notify_email: true,
                    notify_sms: false,
                    notify_marketing: false,
                    created_at: now,
                    updated_at: now,
                };

                match input.provider {
                    OAuthProvider::Google => user.google_id = Some(input.provider_id.clone()),
                    OAuthProvider::Microsoft => {
                        user.microsoft_id = Some(input.provider_id.clone())
                    }
                    OAuthProvider::Apple => user.apple_id = Some(input.provider_id.clone()),
                }

                self.users().create(&user).await?;
                (user, true)
            }
        };

        self.audit(
            AuditEntry::new(format!("oauth_login_{}", input.provider)).user(&user.id),
            meta,
        )
        .await;

        let success = self.issue_session(&user, meta).await?;
        Ok((success, is_new_user))
    }

    pub async fn verify_email(&self, token: &str, meta: &ClientMeta) -> Result<(), ApiError> {
        let Some(user) = self.users().find_by_verification_token(token).await? else {
            return Err(ApiError::validation("Invalid or expired verification token"));
        };

        if user.email_verified {
            return Err(ApiError::validation("Email already verified"));
        }

        let expired = user
            .email_verification_expiry
            .is_none_or(|expiry| expiry < Utc::now());
        if expired {
            return Err(ApiError::validation("Invalid or expired verification token"));
        }

        self.users().mark_email_verified(&user.id).await?;

        self.audit(AuditEntry::new("email_verified").user(&user.id), meta)
            .await;

        Ok(())
    }

    /// Always resolves to the same generic message; only issues and sends
    /// when the account exists and is still unverified.
    pub async fn resend_verification(&self, email: &str) -> Result<(), ApiError> {
        let email = validation::normalize_email(email);

        if let Some(user) = self.users().find_by_email(&email).await? {
            if !user.email_verified {
                let token = tokens::generate_token();
                let expiry = Utc::now() + Duration::hours(VERIFICATION_TOKEN_HOURS);
                self.users()
                    .set_verification_token(&user.id, &token, expiry)
                    .await?;
                self.send_verification_email(email, token);
            }
        }

        Ok(())
    }

    pub async fn request_password_reset(
        &self,
        email: &str,
        meta: &ClientMeta,
    ) -> Result<(), ApiError> {
        let email = validation::normalize_email(email);

        if let Some(user) = self.users().find_by_email(&email).await? {
            let token = tokens::generate_token();
            let expiry = Utc::now() + Duration::hours(RESET_TOKEN_HOURS);
            self.users().set_reset_token(&user.id, &token, expiry).await?;

            self.audit(
                AuditEntry::new("password_reset_requested").user(&user.id),
                meta,
            )
            .await;

            self.send_password_reset_email(email, token);
        }

        Ok(())
    }

    pub async fn reset_password(
        &self,
        token: &str,
        new_password: &str,
        meta: &ClientMeta,
    ) -> Result<(), ApiError> {
        let Some(user) = self
            .users()
            .find_by_valid_reset_token(token, Utc::now())
            .await?
        else {
            return Err(ApiError::validation("Invalid or expired reset token"));
        };

        validation::validate_password_strength(new_password)?;

        let password_hash = hashing::hash_password_async(new_password.to_string()).await?;
        self.users()
            .complete_password_reset(&user.id, &password_hash)
            .await?;

        // Force re-login everywhere
        self.sessions().delete_all_for_user(&user.id).await?;

        self.audit(AuditEntry::new("password_reset").user(&user.id), meta)
            .await;

        Ok(())
    }

    /// Step 1 of enrollment: store a secret that is not yet active and
    /// hand back the provisioning URI.
    pub async fn enable_2fa_init(&self, user: &User) -> Result<TwoFactorSetup, ApiError> {
        if user.two_factor_enabled {
            return Err(ApiError::validation(
                "Two-factor authentication is already enabled",
            ));
        }

        let secret = totp::generate_secret();
        let otpauth_url = totp::provisioning_uri(&secret, &user.email, &self.totp_issuer)?;

        self.users().set_two_factor_secret(&user.id, &secret).await?;

        Ok(TwoFactorSetup { secret, otpauth_url })
    }

    /// Step 2: a valid current code flips the flag on and mints backup
    /// codes. The plaintext codes are returned exactly once.
    pub async fn enable_2fa_verify(
        &self,
        user: &User,
        code: &str,
        meta: &ClientMeta,
    ) -> Result<Vec<String>, ApiError> {
        if user.two_factor_enabled {
            return Err(ApiError::validation(
                "Two-factor authentication is already enabled",
            ));
        }

        let Some(secret) = user.two_factor_secret.as_deref() else {
            return Err(ApiError::not_found("No two-factor setup in progress"));
        };

        if !totp::verify_code(secret, code)? {
            return Err(ApiError::validation("Invalid two-factor code"));
        }

        let codes = tokens::generate_backup_codes(tokens::BACKUP_CODE_COUNT);
        let hashes: Vec<String> = codes.iter().map(|c| tokens::hash_backup_code(c)).collect();
        self.backup_codes().replace_for_user(&user.id, &hashes).await?;

        self.users().enable_two_factor(&user.id).await?;

        self.audit(AuditEntry::new("2fa_enabled").user(&user.id), meta)
            .await;

        Ok(codes)
    }

    pub async fn disable_2fa(
        &self,
        user: &User,
        password: &str,
        meta: &ClientMeta,
    ) -> Result<(), ApiError> {
        if !user.two_factor_enabled {
            return Err(ApiError::validation(
                "Two-factor authentication is not enabled",
            ));
        }

        // OAuth-only accounts have no password to confirm with
        let Some(password_hash) = user.password_hash.clone() else {
            return Err(ApiError::validation(
                "Password confirmation is not available for this account",
            ));
        };

        if !hashing::verify_password_async(password.to_string(), password_hash).await? {
            return Err(ApiError::unauthorized("Invalid password"));
        }

        self.users().disable_two_factor(&user.id).await?;
        self.backup_codes().delete_for_user(&user.id).await?;

        self.audit(AuditEntry::new("2fa_disabled").user(&user.id), meta)
            .await;

        Ok(())
    }

    pub async fn regenerate_backup_codes(
        &self,
        user: &User,
        code: &str,
        meta: &ClientMeta,
    ) -> Result<Vec<String>, ApiError> {
        if !user.two_factor_enabled {
            return Err(ApiError::validation(
                "Two-factor authentication is not enabled",
            ));
        }

        let Some(secret) = user.two_factor_secret.as_deref() else {
            return Err(ApiError::validation(
                "Two-factor authentication is not enabled",
            ));
        };

        if !totp::verify_code(secret, code)? {
            return Err(ApiError::validation("Invalid two-factor code"));
        }

        let codes = tokens::generate_backup_codes(tokens::BACKUP_CODE_COUNT);
        let hashes: Vec<String> = codes.iter().map(|c| tokens::hash_backup_code(c)).collect();
        self.backup_codes().replace_for_user(&user.id, &hashes).await?;

        self.audit(
            AuditEntry::new("backup_codes_regenerated").user(&user.id),
            meta,
        )
        .await;

        Ok(codes)
    }

    /// The session row, not the token signature, is authoritative. The
    /// refresh token itself is never rotated here.
    pub async fn refresh_access_token(
        &self,
        refresh_token: &str,
    ) -> Result<RefreshedAccess, ApiError> {
        if self.jwt.verify_refresh_token(refresh_token).is_err() {
            return Err(ApiError::unauthorized("Invalid refresh token"));
        }

        let Some(session) = self.sessions().find_by_token(refresh_token).await? else {
            return Err(ApiError::unauthorized("Invalid refresh token"));
        };

        if session.expires_at < Utc::now() {
            self.sessions().delete_by_id(&session.id).await?;
            return Err(ApiError::unauthorized("Refresh token expired"));
        }

        let Some(user) = self.users().find_by_id(&session.user_id).await? else {
            return Err(ApiError::unauthorized("Invalid refresh token"));
        };

        if !user.is_available() {
            return Err(ApiError::unauthorized("Account is not available"));
        }

        let access_token = self
            .jwt
            .create_access_token(&user.id, &user.email, Some(&session.id))
            .map_err(|e| ApiError::internal(e.to_string()))?;

        self.sessions().touch(&session.id).await?;

        Ok(RefreshedAccess {
            access_token,
            expires_in: self.jwt.get_access_token_duration_secs(),
        })
    }

    /// Idempotent: logging out an already-absent session succeeds.
    pub async fn logout(
        &self,
        refresh_token: Option<&str>,
        user_id: &str,
        meta: &ClientMeta,
    ) -> Result<(), ApiError> {
        if let Some(token) = refresh_token {
            self.sessions().delete_by_token(token).await?;
        }

        self.audit(AuditEntry::new("logout").user(user_id), meta).await;

        Ok(())
    }

    pub async fn logout_all(&self, user_id: &str, meta: &ClientMeta) -> Result<u64, ApiError> {
        let removed = self.sessions().delete_all_for_user(user_id).await?;

        self.audit(AuditEntry::new("logout_all_devices").user(user_id), meta)
            .await;

        Ok(removed)
    }

    pub async fn list_sessions(&self, user_id: &str) -> Result<Vec<Session>, ApiError> {
        Ok(self.sessions().list_for_user(user_id).await?)
    }

    pub async fn revoke_session(&self, user_id: &str, session_id: &str) -> Result<(), ApiError> {
        if !self
            .sessions()
            .delete_by_id_for_user(session_id, user_id)
            .await?
        {
            return Err(ApiError::not_found("Session not found"));
        }

        Ok(())
    }

    pub async fn change_password(
        &self,
        user: &User,
        current_password: &str,
        new_password: &str,
        meta: &ClientMeta,
    ) -> Result<(), ApiError> {
        let Some(password_hash) = user.password_hash.clone() else {
            return Err(ApiError::validation(
                "Password login is not enabled for this account",
            ));
        };

        if !hashing::verify_password_async(current_password.to_string(), password_hash).await? {
            return Err(ApiError::unauthorized("Invalid password"));
        }

        validation::validate_password_strength(new_password)?;

        let new_hash = hashing::hash_password_async(new_password.to_string()).await?;
        self.users().update_password(&user.id, &new_hash).await?;

        // Same treatment as a reset: every device logs in again
        self.sessions().delete_all_for_user(&user.id).await?;

        self.audit(AuditEntry::new("password_changed").user(&user.id), meta)
            .await;

        Ok(())
    }

    /// Soft delete; the row survives with an anonymized email. Sessions
    /// are revoked so outstanding refresh tokens die with the account.
    pub async fn delete_account(
        &self,
        user: &User,
        password: Option<&str>,
        meta: &ClientMeta,
    ) -> Result<(), ApiError> {
        if let Some(password_hash) = user.password_hash.clone() {
            let Some(password) = password else {
                return Err(ApiError::validation("Password is required"));
            };
            if !hashing::verify_password_async(password.to_string(), password_hash).await? {
                return Err(ApiError::unauthorized("Invalid password"));
            }
        }

        let anonymized = format!("deleted-{}@anonymized.invalid", user.id);
        self.users().soft_delete(&user.id, &anonymized).await?;
        self.sessions().delete_all_for_user(&user.id).await?;

        self.audit(AuditEntry::new("account_deleted").user(&user.id), meta)
            .await;

        Ok(())
    }
}
