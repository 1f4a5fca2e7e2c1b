use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::config::DbPool;
use crate::modules::auth::model::{AuditEntry, BackupCode, OAuthProvider, Session, User};

pub const MAX_FAILED_ATTEMPTS: i32 = 5;

pub struct UserCrud {
    pool: DbPool,
}

impl UserCrud {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, user: &User) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO users (
                id, email, name, phone, password_hash,
                failed_login_attempts, locked_until,
                email_verified, email_verified_at,
                email_verification_token, email_verification_expiry,
                password_reset_token, password_reset_expiry,
                two_factor_enabled, two_factor_secret,
                google_id, microsoft_id, apple_id,
                is_active, is_suspended, suspension_reason, deleted_at,
                last_login_at, last_login_ip,
                notify_email, notify_sms, notify_marketing,
                created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.phone)
        .bind(&user.password_hash)
        .bind(user.failed_login_attempts)
        .bind(user.locked_until)
        .bind(user.email_verified)
        .bind(user.email_verified_at)
        .bind(&user.email_verification_token)
        .bind(user.email_verification_expiry)
        .bind(&user.password_reset_token)
        .bind(user.password_reset_expiry)
        .bind(user.two_factor_enabled)
        .bind(&user.two_factor_secret)
        .bind(&user.google_id)
        .bind(&user.microsoft_id)
        .bind(&user.apple_id)
        .bind(user.is_active)
        .bind(user.is_suspended)
        .bind(&user.suspension_reason)
        .bind(user.deleted_at)
        .bind(user.last_login_at)
        .bind(&user.last_login_ip)
        .bind(user.notify_email)
        .bind(user.notify_sms)
        .bind(user.notify_marketing)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Lookup by normalized email; soft-deleted rows are excluded.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ? AND deleted_at IS NULL")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn find_by_provider(
        &self,
        provider: OAuthProvider,
        provider_id: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        let query = match provider {
            OAuthProvider::Google => {
                "SELECT * FROM users WHERE google_id = ? AND deleted_at IS NULL"
            }
            OAuthProvider::Microsoft => {
                "SELECT * FROM users WHERE microsoft_id = ? AND deleted_at IS NULL"
            }
            OAuthProvider::Apple => {
                "SELECT * FROM users WHERE apple_id = ? AND deleted_at IS NULL"
            }
        };

        sqlx::query_as::<_, User>(query)
            .bind(provider_id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn link_provider(
        &self,
        user_id: &str,
        provider: OAuthProvider,
        provider_id: &str,
    ) -> Result<(), sqlx::Error> {
        let query = match provider {
            OAuthProvider::Google => {
                "UPDATE users SET google_id = ?, updated_at = ? WHERE id = ?"
            }
            OAuthProvider::Microsoft => {
                "UPDATE users SET microsoft_id = ?, updated_at = ? WHERE id = ?"
            }
            OAuthProvider::Apple => {
                "UPDATE users SET apple_id = ?, updated_at = ? WHERE id = ?"
            }
        };

        sqlx::query(query)
            .bind(provider_id)
            .bind(Utc::now())
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn find_by_verification_token(
        &self,
        token: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE email_verification_token = ? AND deleted_at IS NULL",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
    }

    /// Reset-token lookup is expiry-filtered in SQL: an expired token is
    /// indistinguishable from a missing one.
    pub async fn find_by_valid_reset_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT * FROM users
            WHERE password_reset_token = ? AND password_reset_expiry > ? AND deleted_at IS NULL
            "#,
        )
        .bind(token)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn set_verification_token(
        &self,
        user_id: &str,
        token: &str,
        expiry: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE users
            SET email_verification_token = ?, email_verification_expiry = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(token)
        .bind(expiry)
        .bind(Utc::now())
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn mark_email_verified(&self, user_id: &str) -> Result<(), sqlx::Error> {
        let now = Utc::now();
        sqlx::query(
            r#"
            UPDATE users
            SET email_verified = TRUE, email_verified_at = ?,
                email_verification_token = NULL, email_verification_expiry = NULL,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(now)
        .bind(now)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn set_reset_token(
        &self,
        user_id: &str,
        token: &str,
        expiry: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE users
            SET password_reset_token = ?, password_reset_expiry = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(token)
        .bind(expiry)
        .bind(Utc::now())
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// New hash in, reset token and lockout counters out, in one statement.
    pub async fn complete_password_reset(
        &self,
        user_id: &str,
        password_hash: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE users
            SET password_hash = ?,
                password_reset_token = NULL, password_reset_expiry = NULL,
                failed_login_attempts = 0, locked_until = NULL,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(password_hash)
        .bind(Utc::now())
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn update_password(
        &self,
        user_id: &str,
        password_hash: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
            .bind(password_hash)
            .bind(Utc::now())
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Atomic failure bookkeeping: the increment and the conditional lock
    /// happen in a single UPDATE, so concurrent failures cannot lose a
    /// count. MySQL evaluates SET left to right, so the IF sees the
    /// already-incremented counter. Returns (attempts, locked_until).
    pub async fn record_login_failure(
        &self,
        user_id: &str,
        lock_until: DateTime<Utc>,
    ) -> Result<(i32, Option<DateTime<Utc>>), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE users
            SET failed_login_attempts = failed_login_attempts + 1,
                locked_until = IF(failed_login_attempts >= ?, ?, locked_until),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(MAX_FAILED_ATTEMPTS)
        .bind(lock_until)
        .bind(Utc::now())
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        let row: (i32, Option<DateTime<Utc>>) =
            sqlx::query_as("SELECT failed_login_attempts, locked_until FROM users WHERE id = ?")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(row)
    }

    pub async fn record_login_success(
        &self,
        user_id: &str,
        ip: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        let now = Utc::now();
        sqlx::query(
            r#"
            UPDATE users
            SET failed_login_attempts = 0, locked_until = NULL,
                last_login_at = ?, last_login_ip = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(now)
        .bind(ip)
        .bind(now)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn set_two_factor_secret(
        &self,
        user_id: &str,
        secret: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET two_factor_secret = ?, updated_at = ? WHERE id = ?")
            .bind(secret)
            .bind(Utc::now())
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn enable_two_factor(&self, user_id: &str) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET two_factor_enabled = TRUE, updated_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn disable_two_factor(&self, user_id: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE users
            SET two_factor_enabled = FALSE, two_factor_secret = NULL, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(Utc::now())
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn update_profile(
        &self,
        user_id: &str,
        name: Option<&str>,
        phone: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE users
            SET name = COALESCE(?, name), phone = COALESCE(?, phone), updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(name)
        .bind(phone)
        .bind(Utc::now())
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn update_notifications(
        &self,
        user_id: &str,
        notify_email: bool,
        notify_sms: bool,
        notify_marketing: bool,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE users
            SET notify_email = ?, notify_sms = ?, notify_marketing = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(notify_email)
        .bind(notify_sms)
        .bind(notify_marketing)
        .bind(Utc::now())
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Soft delete: the row stays, the email is anonymized, the account
    /// goes inactive.
    pub async fn soft_delete(
        &self,
        user_id: &str,
        anonymized_email: &str,
    ) -> Result<(), sqlx::Error> {
        let now = Utc::now();
        sqlx::query(
            r#"
            UPDATE users
            SET email = ?, is_active = FALSE, deleted_at = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(anonymized_email)
        .bind(now)
        .bind(now)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

pub struct SessionCrud {
    pool: DbPool,
}

impl SessionCrud {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, session: &Session) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO sessions (id, user_id, refresh_token, user_agent, ip, expires_at, last_used_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&session.id)
        .bind(&session.user_id)
        .bind(&session.refresh_token)
        .bind(&session.user_agent)
        .bind(&session.ip)
        .bind(session.expires_at)
        .bind(session.last_used_at)
        .bind(session.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn find_by_token(&self, refresh_token: &str) -> Result<Option<Session>, sqlx::Error> {
        sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE refresh_token = ?")
            .bind(refresh_token)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<Session>, sqlx::Error> {
        sqlx::query_as::<_, Session>(
            "SELECT * FROM sessions WHERE user_id = ? ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn touch(&self, session_id: &str) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE sessions SET last_used_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(session_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Idempotent: deleting an absent token is not an error.
    pub async fn delete_by_token(&self, refresh_token: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sessions WHERE refresh_token = ?")
            .bind(refresh_token)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_by_id(&self, session_id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(session_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_by_id_for_user(
        &self,
        session_id: &str,
        user_id: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = ? AND user_id = ?")
            .bind(session_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_all_for_user(&self, user_id: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

pub struct BackupCodeCrud {
    pool: DbPool,
}

impl BackupCodeCrud {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Replace the user's code set wholesale (enrollment or regeneration).
    pub async fn replace_for_user(
        &self,
        user_id: &str,
        code_hashes: &[String],
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM backup_codes WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        let now = Utc::now();
        for hash in code_hashes {
            let code = BackupCode {
                id: Uuid::new_v4().to_string(),
                user_id: user_id.to_string(),
                code_hash: hash.clone(),
                created_at: now,
            };
            sqlx::query(
                "INSERT INTO backup_codes (id, user_id, code_hash, created_at) VALUES (?, ?, ?, ?)",
            )
            .bind(&code.id)
            .bind(&code.user_id)
            .bind(&code.code_hash)
            .bind(code.created_at)
            .execute(&self.pool)
            .await?;
        }

        Ok(())
    }

    /// Single-use consumption as one conditional DELETE: of two racing
    /// logins presenting the same code, exactly one sees an affected row.
    pub async fn consume(&self, user_id: &str, code_hash: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM backup_codes WHERE user_id = ? AND code_hash = ?")
            .bind(user_id)
            .bind(code_hash)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_for_user(&self, user_id: &str) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM backup_codes WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

pub struct AuditLogCrud {
    pool: DbPool,
}

impl AuditLogCrud {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, entry: &AuditEntry) -> Result<(), sqlx::Error> {
        let metadata = entry
            .metadata
            .as_ref()
            .map(|m| serde_json::to_string(m).unwrap_or_default());

        sqlx::query(
            r#"
            INSERT INTO audit_logs (id, user_id, action, entity_type, entity_id, ip, user_agent, metadata, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&entry.user_id)
        .bind(&entry.action)
        .bind(&entry.entity_type)
        .bind(&entry.entity_id)
        .bind(&entry.ip)
        .bind(&entry.user_agent)
        .bind(metadata)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
