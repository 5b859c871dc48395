use std::env;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}

/// Process-wide configuration, read once at startup. Missing provider keys
/// are a valid state and drive provider selection, not an error.
#[derive(Debug, Clone)]
pub struct Config {
    pub gemini_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub google_maps_key: Option<String>,
    pub gemini_model: String,
    pub openai_model: String,
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

#[derive(Debug, Clone)]
pub struct Context {
    pub config: Config,
}

impl Context {
    pub fn new() -> Result<Self, ConfigError> {
        Ok(Self {
            config: Config::from_env()?,
        })
    }
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn var_or(name: &str, default: &str) -> String {
    optional_var(name).unwrap_or_else(|| default.to_string())
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = match optional_var("PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidValue("PORT".to_string()))?,
            None => 8787,
        };
        Ok(Self {
            gemini_api_key: optional_var("GEMINI_API_KEY"),
            openai_api_key: optional_var("OPENAI_API_KEY"),
            google_maps_key: optional_var("GOOGLE_MAPS_KEY"),
            gemini_model: var_or("GEMINI_MODEL", "gemini-1.5-flash"),
            openai_model: var_or("OPENAI_MODEL", "gpt-4o-mini"),
            host: var_or("HOST", "127.0.0.1"),
            port,
            log_level: var_or("LOG_LEVEL", "info"),
        })
    }
}
