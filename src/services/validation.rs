use std::sync::OnceLock;

use regex::Regex;

use crate::error::ApiError;

const MAX_LOCAL_PART: usize = 64;
const MAX_DOMAIN: usize = 255;

// Substring deny-list; any appearance (case-insensitive) fails the policy
const WEAK_SUBSTRINGS: &[&str] = &[
    "password", "qwerty", "123456", "letmein", "abc123", "iloveyou", "admin", "welcome",
];

// Matched as substrings of the domain, so subdomains are covered too
const DISPOSABLE_DOMAINS: &[&str] = &[
    "mailinator.com",
    "guerrillamail.com",
    "10minutemail.com",
    "tempmail.com",
    "throwaway.email",
    "yopmail.com",
    "trashmail.com",
];

const PASSWORD_SYMBOLS: &str = "!@#$%^&*()_+-=[]{}|;:'\",.<>?/`~\\";

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap())
}

/// Lowercase + trim. Applied before every lookup and before storage.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Validate an already-normalized email address.
pub fn validate_email(email: &str) -> Result<(), ApiError> {
    if !email_regex().is_match(email) {
        return Err(ApiError::validation("Invalid email address"));
    }

    let (local, domain) = email
        .split_once('@')
        .ok_or_else(|| ApiError::validation("Invalid email address"))?;

    if local.len() > MAX_LOCAL_PART {
        return Err(ApiError::validation("Email local part is too long"));
    }

    if domain.len() > MAX_DOMAIN {
        return Err(ApiError::validation("Email domain is too long"));
    }

    if DISPOSABLE_DOMAINS.iter().any(|d| domain.contains(d)) {
        return Err(ApiError::validation(
            "Disposable email addresses are not allowed",
        ));
    }

    Ok(())
}

/// Password policy: at least 8 chars with one uppercase, one lowercase,
/// one digit, one symbol, and none of the common weak substrings.
pub fn validate_password_strength(password: &str) -> Result<(), ApiError> {
    if password.chars().count() < 8 {
        return Err(ApiError::validation(
            "Password must be at least 8 characters",
        ));
    }

    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(ApiError::validation(
            "Password must contain an uppercase letter",
        ));
    }

    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return Err(ApiError::validation(
            "Password must contain a lowercase letter",
        ));
    }

    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(ApiError::validation("Password must contain a digit"));
    }

    if !password.chars().any(|c| PASSWORD_SYMBOLS.contains(c)) {
        return Err(ApiError::validation("Password must contain a symbol"));
    }

    let lowered = password.to_lowercase();
    if WEAK_SUBSTRINGS.iter().any(|weak| lowered.contains(weak)) {
        return Err(ApiError::validation(
            "Password contains a common weak pattern",
        ));
    }

    Ok(())
}
