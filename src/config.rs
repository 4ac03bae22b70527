use std::env;

use tracing::warn;

const DEFAULT_JWT_SECRET: &str = "taskflow-dev-secret";

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub jwt_secret: String,
    pub access_token_minutes: i64,
    pub refresh_token_days: i64,
    pub password_hashing_secret: String,
    pub smtp: SmtpConfig,
}

#[derive(Clone)]
pub struct SmtpConfig {
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

#[cfg(test)]
impl Config {
    pub fn for_tests() -> Self {
        Self {
            database_url: String::new(),
            port: 3000,
            jwt_secret: "test-secret".to_string(),
            access_token_minutes: 5,
            refresh_token_days: 7,
            password_hashing_secret: "pepper".to_string(),
            smtp: SmtpConfig {
                server: String::new(),
                port: 587,
                username: String::new(),
                password: String::new(),
            },
        }
    }
}

impl Config {
    /// Read the whole configuration from the process environment once.
    /// Everything downstream takes this struct by reference instead of
    /// touching env vars.
    pub fn from_env() -> Self {
        let jwt_secret = env::var("JWT_SECRET").unwrap_or_else(|_| {
            warn!("JWT_SECRET not set, falling back to the insecure built-in secret");
            DEFAULT_JWT_SECRET.to_string()
        });

        Self {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            jwt_secret,
            access_token_minutes: env::var("ACCESSTOKENEXPIRATION")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
            refresh_token_days: env::var("REFRESHTOKENEXPIRATION")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(7),
            password_hashing_secret: env::var("PASSWORD_HASHING_SECRET")
                .expect("PASSWORD_HASHING_SECRET must be set"),
            smtp: SmtpConfig {
                server: env::var("SMTP_SERVER").expect("SMTP_SERVER must be set"),
                port: env::var("SMTP_PORT")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(587),
                username: env::var("SMTP_USERNAME").expect("SMTP_USERNAME must be set"),
                password: env::var("SMTP_PASSWORD").expect("SMTP_PASSWORD must be set"),
            },
        }
    }
}
