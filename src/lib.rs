pub mod configuration;
pub mod core;
pub mod extraction;
pub mod geocoding;
pub mod llm;
pub mod title;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Config Error:{0}")]
    ConfigError(String),

    #[error("Server Error:{0}")]
    ServerError(String),
}
