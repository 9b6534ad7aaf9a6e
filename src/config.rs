use anyhow::{Context, Result};

/// Process configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    /// Sessions expire after this much inactivity.
    pub session_ttl_minutes: i64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // A missing .env file is fine; real deployments set the
        // environment directly.
        let _ = dotenv::dotenv();

        Ok(Self {
            database_url: std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_owned()),
            session_ttl_minutes: std::env::var("SESSION_TTL_MINUTES")
                .unwrap_or_else(|_| "30".to_owned())
                .parse()
                .context("SESSION_TTL_MINUTES must be a whole number of minutes")?,
        })
    }
}
