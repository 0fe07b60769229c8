//! Error types for the session server

use thiserror::Error;

/// Failures while resolving a nail's collision filter
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocationError {
    #[error("no collision categories left in the pool")]
    CategoryPoolExhausted,

    #[error("group number counter exhausted")]
    GroupNumbersExhausted,
}

/// Payload values rejected at the boundary before dispatch
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{field} must not be empty")]
    EmptyField { field: &'static str },

    #[error("{field} must be a finite number")]
    NonFinite { field: &'static str },

    #[error("{field} must be positive, got {value}")]
    NotPositive { field: &'static str, value: f32 },

    #[error("{field} must not be negative, got {value}")]
    Negative { field: &'static str, value: f32 },

    #[error("hinge position index {0} is out of range (0..=2)")]
    HingeIndexOutOfRange(u8),

    #[error("chain cannot link pin {0} to itself")]
    SelfLinkedChain(String),

    #[error("shape has no points")]
    EmptyShape,
}

/// Failures appending to the durable action log
#[derive(Debug, Error)]
pub enum ActionLogError {
    #[error("action log I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("action log CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("action log append timed out after {0:?}")]
    TimedOut(std::time::Duration),

    #[error("action log sink unavailable: {0}")]
    Unavailable(String),
}

/// Transport-level failures that stop the server
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),

    #[error("packet codec error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("action log error: {0}")]
    ActionLog(#[from] ActionLogError),
}
