use anyhow::{Context, Result};

use crate::report::decoder::DecodingMode;

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub openai_api_key: String,
    /// Absent → industry research is skipped with a warning.
    pub tavily_api_key: Option<String>,
    pub decoding_mode: DecodingMode,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let decoding_mode = match std::env::var("DECODING_MODE") {
            Ok(raw) => raw
                .parse::<DecodingMode>()
                .context("DECODING_MODE must be 'structured' or 'freeform'")?,
            Err(_) => DecodingMode::default(),
        };

        Ok(Config {
            openai_api_key: require_env("OPENAI_API_KEY")?,
            tavily_api_key: std::env::var("TAVILY_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            decoding_mode,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}
