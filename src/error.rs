//! Error types for the stats pipeline

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Error connecting to warehouse: {0}")]
    ConnectionError(String),

    #[error("Warehouse query error: {0}")]
    WarehouseError(String),

    #[error("Unexpected query result shape: {0}")]
    QueryShape(String),

    #[error("Analytics API error: {0}")]
    AnalyticsError(String),

    #[error("Failed to send to chat: {0}")]
    ChatError(String),

    #[error("Handoff error: {0}")]
    HandoffError(String),

    #[error("Failed to publish alert: {0}")]
    AlertError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::WarehouseError(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}

impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}
