use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct Config {
    // Database
    pub database_url: String,

    // Auth
    pub secret_key: String,
    pub access_token_expire_minutes: i64,

    // Server
    pub host: String,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            // Database - a local SQLite file by default
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:loquela.db".to_string()),

            // Auth - the JWT signing key has no safe default
            secret_key: std::env::var("SECRET_KEY").context("SECRET_KEY not set")?,
            access_token_expire_minutes: std::env::var("ACCESS_TOKEN_EXPIRE_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),

            // Server
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),
        })
    }
}
