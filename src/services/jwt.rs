use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const TOKEN_TYPE_ACCESS: &str = "access";
pub const TOKEN_TYPE_REFRESH: &str = "refresh";

/// Claims for the short-lived access token. `typ` distinguishes it from a
/// refresh token; the two are never interchangeable.
#[derive(Debug, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: String,        // user id
    pub email: String,
    pub typ: String,        // "access"
    pub sid: Option<String>, // session id, when issued alongside a session
    pub exp: i64,           // expiration time
    pub iat: i64,           // issued at
    pub jti: String,        // unique token id
}

/// Claims for the long-lived refresh token. The session row in the store,
/// not this signature, is authoritative for revocation.
#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: String,        // user id
    pub email: String,
    pub typ: String,        // "refresh"
    pub sid: String,        // session id
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
}

#[derive(Clone)]
pub struct JwtService {
    secret: String,
    access_token_duration: Duration,
    refresh_token_duration: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("wrong token type")]
    WrongTokenType,
}

impl JwtService {
    pub fn new(secret: String) -> Self {
        Self {
            secret,
            access_token_duration: Duration::minutes(15),
            refresh_token_duration: Duration::days(30),
        }
    }

    pub fn create_access_token(
        &self,
        user_id: &str,
        email: &str,
        session_id: Option<&str>,
    ) -> Result<String, JwtError> {
        let now = Utc::now();
        let exp = now + self.access_token_duration;

        let claims = AccessClaims {
            sub: user_id.to_string(),
            email: email.to_string(),
            typ: TOKEN_TYPE_ACCESS.to_string(),
            sid: session_id.map(str::to_string),
            exp: exp.timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        Ok(encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )?)
    }

    pub fn create_refresh_token(
        &self,
        user_id: &str,
        email: &str,
        session_id: &str,
    ) -> Result<String, JwtError> {
        let now = Utc::now();
        let exp = now + self.refresh_token_duration;

        let claims = RefreshClaims {
            sub: user_id.to_string(),
            email: email.to_string(),
            typ: TOKEN_TYPE_REFRESH.to_string(),
            sid: session_id.to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        Ok(encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )?)
    }

    pub fn verify_access_token(&self, token: &str) -> Result<TokenData<AccessClaims>, JwtError> {
        let data = decode::<AccessClaims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )?;

        if data.claims.typ != TOKEN_TYPE_ACCESS {
            return Err(JwtError::WrongTokenType);
        }

        Ok(data)
    }

    pub fn verify_refresh_token(&self, token: &str) -> Result<TokenData<RefreshClaims>, JwtError> {
        let data = decode::<RefreshClaims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )?;

        if data.claims.typ != TOKEN_TYPE_REFRESH {
            return Err(JwtError::WrongTokenType);
        }

        Ok(data)
    }

    pub fn get_access_token_duration_secs(&self) -> i64 {
        self.access_token_duration.num_seconds()
    }

    pub fn get_refresh_token_duration(&self) -> Duration {
        self.refresh_token_duration
    }
}
