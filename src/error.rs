//! Errors returned across the host boundary.
//!
//! Expected conditions (expired or tampered tokens, duplicate closes,
//! signals with no active session) are outcome values, not errors. What
//! remains here is caller misuse and an unavailable clock.

use thiserror::Error;

use crate::authorization::{KeyError, ValidationErrorKind};
use crate::clock::ClockError;
use crate::session::CloseReason;

#[derive(Debug, Error)]
pub enum OperationError {
    #[error("Authorization rejected: {0}")]
    ValidationFailed(ValidationErrorKind),

    #[error("Close reason {0} cannot be requested explicitly")]
    InvalidCloseReason(CloseReason),

    #[error("Clock unavailable: {0}")]
    Clock(#[from] ClockError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing signing key: set {0} or {1}")]
    MissingKey(&'static str, &'static str),

    #[error("Invalid value for {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },

    #[error("Session timeout must be greater than zero")]
    ZeroTimeout,

    #[error("Invalid open parameters: {0}")]
    InvalidParams(#[from] serde_json::Error),

    #[error("Invalid signing key: {0}")]
    Key(#[from] KeyError),
}
