use memo_api::security::AuthError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MemoError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<Box<dyn std::error::Error + Send + Sync>> for MemoError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        MemoError::Internal(err.to_string())
    }
}

impl From<String> for MemoError {
    fn from(err: String) -> Self {
        MemoError::Internal(err)
    }
}

impl From<&str> for MemoError {
    fn from(err: &str) -> Self {
        MemoError::Internal(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MemoError>;
