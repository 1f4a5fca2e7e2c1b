use std::env;
use std::sync::OnceLock;

static PRODUCTION: OnceLock<bool> = OnceLock::new();

/// True once a production `APP_ENV` has been loaded by
/// [`Config::from_env`]. Defaults to false, which is what development
/// and tests want.
pub fn is_production() -> bool {
    PRODUCTION.get().copied().unwrap_or(false)
}

/// Environment configuration
/// Loads and validates environment variables
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub app_env: String,
    pub frontend_url: String,
    pub totp_issuer: String,
    pub smtp: Option<SmtpConfig>,
}

pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_address: String,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| "DATABASE_URL must be set".to_string())?;

        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| "JWT_SECRET must be set".to_string())?;

        let app_env = env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
        let _ = PRODUCTION.set(app_env == "production");

        let frontend_url =
            env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:5173".to_string());

        let totp_issuer =
            env::var("TOTP_ISSUER").unwrap_or_else(|_| "DebtRescue.AI".to_string());

        // SMTP is optional; without it outbound email is logged instead of sent
        let smtp = match env::var("SMTP_HOST") {
            Ok(host) => {
                let port = env::var("SMTP_PORT")
                    .unwrap_or_else(|_| "587".to_string())
                    .parse::<u16>()
                    .map_err(|_| "SMTP_PORT must be a valid port number".to_string())?;
                let username = env::var("SMTP_USERNAME")
                    .map_err(|_| "SMTP_USERNAME must be set when SMTP_HOST is".to_string())?;
                let password = env::var("SMTP_PASSWORD")
                    .map_err(|_| "SMTP_PASSWORD must be set when SMTP_HOST is".to_string())?;
                let from_address = env::var("SMTP_FROM")
                    .unwrap_or_else(|_| "DebtRescue.AI <no-reply@debtrescue.ai>".to_string());
                Some(SmtpConfig {
                    host,
                    port,
                    username,
                    password,
                    from_address,
                })
            }
            Err(_) => None,
        };

        Ok(Self {
            database_url,
            jwt_secret,
            app_env,
            frontend_url,
            totp_issuer,
            smtp,
        })
    }
}
