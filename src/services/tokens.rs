use rand::RngCore;
use sha2::{Digest, Sha256};

/// Opaque tokens for email verification and password reset: 32 random
/// bytes, hex-encoded. Uniqueness is enforced by the store's unique index,
/// not here.
pub const OPAQUE_TOKEN_BYTES: usize = 32;

pub const BACKUP_CODE_COUNT: usize = 10;

pub fn generate_token() -> String {
    let mut bytes = [0u8; OPAQUE_TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Backup codes are displayed as two 4-character hex groups, e.g.
/// `3fa9-c01d`. Only the SHA-256 of a code is ever stored.
pub fn generate_backup_codes(count: usize) -> Vec<String> {
    (0..count)
        .map(|_| {
            let mut bytes = [0u8; 4];
            rand::rng().fill_bytes(&mut bytes);
            let hex = hex::encode(bytes);
            format!("{}-{}", &hex[..4], &hex[4..])
        })
        .collect()
}

pub fn hash_backup_code(code: &str) -> String {
    let normalized = code.trim().to_lowercase();
    let digest = Sha256::digest(normalized.as_bytes());
    hex::encode(digest)
}
