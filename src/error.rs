use thiserror::Error;

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(format!("JSON serialization error: {}", err))
    }
}

impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(format!("Database error: {}", err))
    }
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Missing required field: {field}")]
    Encoding { field: &'static str },

    #[error("Cannot compute Merkle root of an empty batch")]
    EmptyBatch,

    #[error("Invalid fingerprint: {0}")]
    InvalidFingerprint(String),

    #[error("Ledger error: {0}")]
    Ledger(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Verification record persistence failed: {0}")]
    Persistence(String),
}
