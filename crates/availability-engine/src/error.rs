//! Error types for availability-engine operations.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Malformed recurrence rule: {0}")]
    MalformedRule(String),

    #[error("Invalid declaration {id}: {reason}")]
    InvalidDeclaration { id: String, reason: String },

    #[error("Invalid time of day {0}: expected HHMM")]
    InvalidClockTime(i64),

    #[error("Invalid date window: {start} is after {end}")]
    InvalidWindow { start: String, end: String },

    #[error("Invalid timestamp {0}: expected epoch seconds")]
    InvalidTimestamp(i64),

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Availability service error: {0}")]
    Network(String),

    #[error("Response decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        EngineError::Network(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
