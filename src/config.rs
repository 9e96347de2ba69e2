use anyhow::{Context, Result};
use std::env;

pub const DEFAULT_ALLOWED_ORIGIN: &str = "http://127.0.0.1:5500";

/// Everything the process reads from its environment, resolved once at
/// startup. A missing required variable aborts boot; nothing here is
/// recoverable per-request.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub openai_api_key: String,
    pub allowed_origin: String,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL not set")?;
        let openai_api_key = env::var("OPENAI_API_KEY").context("OPENAI_API_KEY not set")?;
        let allowed_origin =
            env::var("ALLOWED_ORIGIN").unwrap_or_else(|_| DEFAULT_ALLOWED_ORIGIN.into());
        let port = env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(8080);

        Ok(Self {
            database_url,
            openai_api_key,
            allowed_origin,
            port,
        })
    }
}
