//! Error types for the portfolio assistant
//!
//! None of these are fatal to a turn. Every component boundary recovers them
//! into a degraded value (empty portfolio, `unknown` intent, zero price).

use thiserror::Error;

/// Result type alias for assistant operations
pub type Result<T> = std::result::Result<T, AssistantError>;

#[derive(Error, Debug)]
pub enum AssistantError {

    // =============================
    // Oracle Failures
    // =============================

    #[error("Oracle returned malformed data: {0}")]
    OracleMalformed(String),

    #[error("Oracle unavailable: {0}")]
    OracleUnavailable(String),

    #[error("Oracle rejected request: {0}")]
    OracleRejected(String),

    // =============================
    // Storage Failures
    // =============================

    #[error("Portfolio store unavailable: {0}")]
    PersistenceUnavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl AssistantError {
    /// Whether retrying the same oracle call may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            AssistantError::OracleUnavailable(_) => true,
            AssistantError::HttpError(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}
