//! Error handling for the application

use thiserror::Error;

/// Price-source errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PriceError {
    #[error("Price feed unavailable")]
    Unavailable,

    #[error("Empty history data")]
    EmptyResult,

    #[error("Invalid price data: {0}")]
    InvalidPrice(f64),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Failed to parse price response: {0}")]
    Parse(String),

    #[error("Unknown symbol: {0}")]
    UnknownSymbol(String),
}

impl From<reqwest::Error> for PriceError {
    fn from(err: reqwest::Error) -> Self {
        PriceError::Http(err.to_string())
    }
}

/// Every attempt of a fetch failed
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Failed to fetch price after {attempts} retries: {last_error}")]
pub struct FetchError {
    pub attempts: u32,
    pub last_error: PriceError,
}

/// Session and export persistence errors
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Session belongs to {found}, expected {expected}")]
    TickerMismatch { expected: String, found: String },
}

/// Notification channel errors
#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("{channel} delivery failed: {reason}")]
    Delivery { channel: String, reason: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Message rejected: {0}")]
    Rejected(String),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {reason}")]
    Parse { path: String, reason: String },

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// General application error
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    ConfigError(#[from] ConfigError),

    #[error("Persistence error: {0}")]
    PersistenceError(#[from] PersistenceError),

    #[error("Price error: {0}")]
    PriceError(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<PriceError> for AppError {
    fn from(err: PriceError) -> Self {
        AppError::PriceError(err.to_string())
    }
}

impl From<NotificationError> for AppError {
    fn from(err: NotificationError) -> Self {
        AppError::Unknown(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retries_exhausted_message() {
        let err = FetchError {
            attempts: 3,
            last_error: PriceError::EmptyResult,
        };
        assert_eq!(
            err.to_string(),
            "Failed to fetch price after 3 retries: Empty history data"
        );
    }
}
