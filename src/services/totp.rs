use data_encoding::BASE32;
use rand::RngCore;
use totp_rs::{Algorithm, TOTP};

use crate::error::ApiError;

const SECRET_BYTES: usize = 20;
const DIGITS: usize = 6;
const STEP_SECONDS: u64 = 30;
// ±1 step of clock skew tolerated on verification
const SKEW: u8 = 1;

/// Generate a new shared secret, base32-encoded for authenticator apps.
pub fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    BASE32.encode(&bytes)
}

fn build(secret_base32: &str, issuer: Option<String>, account: String) -> Result<TOTP, ApiError> {
    let secret_bytes = BASE32
        .decode(secret_base32.as_bytes())
        .map_err(|e| ApiError::internal(format!("invalid TOTP secret encoding: {e}")))?;

    TOTP::new(
        Algorithm::SHA1,
        DIGITS,
        SKEW,
        STEP_SECONDS,
        secret_bytes,
        issuer,
        account,
    )
    .map_err(|e| ApiError::internal(format!("TOTP construction failed: {e}")))
}

/// otpauth:// URI embedding account label, issuer, and secret, for
/// authenticator-app enrollment.
pub fn provisioning_uri(
    secret_base32: &str,
    account: &str,
    issuer: &str,
) -> Result<String, ApiError> {
    let totp = build(
        secret_base32,
        Some(issuer.to_string()),
        account.to_string(),
    )?;
    Ok(totp.get_url())
}

/// Verify a 6-digit code against the secret for the current time window.
pub fn verify_code(secret_base32: &str, code: &str) -> Result<bool, ApiError> {
    let totp = build(secret_base32, None, String::new())?;
    Ok(totp.check_current(code.trim()).unwrap_or(false))
}

/// Current code for the secret. Only meaningful for tests and enrollment
/// previews; verification goes through [`verify_code`].
pub fn current_code(secret_base32: &str) -> Result<String, ApiError> {
    let totp = build(secret_base32, None, String::new())?;
    totp.generate_current()
        .map_err(|e| ApiError::internal(format!("TOTP generation failed: {e}")))
}
