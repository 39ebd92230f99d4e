//! Error types for card-disclosure authorization.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Reason an authorization request was rejected.
///
/// Serialized with the codes the host bridge reports in `validationError`
/// events (`TOKEN_MALFORMED`, `TOKEN_EXPIRED`, `SIGNATURE_MISMATCH`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationErrorKind {
    /// Token is not `<cardId>:<issuedAtMillis>` or is bound to another card.
    TokenMalformed,
    /// Token is older than the maximum age or issued in the future.
    TokenExpired,
    /// HMAC over the canonical material does not match the signature.
    SignatureMismatch,
}

impl ValidationErrorKind {
    /// Whether the caller may mint a fresh token for the same card and retry.
    pub fn is_recoverable(self) -> bool {
        matches!(self, ValidationErrorKind::TokenExpired)
    }

    pub fn code(self) -> &'static str {
        match self {
            ValidationErrorKind::TokenMalformed => "TOKEN_MALFORMED",
            ValidationErrorKind::TokenExpired => "TOKEN_EXPIRED",
            ValidationErrorKind::SignatureMismatch => "SIGNATURE_MISMATCH",
        }
    }

    /// Human readable message surfaced to the host alongside the code.
    pub fn message(self) -> &'static str {
        match self {
            ValidationErrorKind::TokenMalformed => "Token is malformed",
            ValidationErrorKind::TokenExpired => "Token has expired",
            ValidationErrorKind::SignatureMismatch => "Invalid token signature",
        }
    }
}

impl fmt::Display for ValidationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Syntax errors raised while decoding or constructing a token.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("Token is missing the ':' separator")]
    MissingSeparator,

    #[error("Token card id is empty")]
    EmptyCardId,

    #[error("Card id must not contain ':'")]
    SeparatorInCardId,

    #[error("Token timestamp is not a non-negative integer: {0:?}")]
    InvalidTimestamp(String),
}

/// Errors raised while loading signing key material.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("Signing key must not be empty")]
    Empty,

    #[error("Invalid key format: {0}")]
    InvalidFormat(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_expiry_is_recoverable() {
        assert!(ValidationErrorKind::TokenExpired.is_recoverable());
        assert!(!ValidationErrorKind::TokenMalformed.is_recoverable());
        assert!(!ValidationErrorKind::SignatureMismatch.is_recoverable());
    }

    #[test]
    fn test_kind_serializes_as_code() {
        let json = serde_json::to_string(&ValidationErrorKind::SignatureMismatch).unwrap();
        assert_eq!(json, "\"SIGNATURE_MISMATCH\"");
        assert_eq!(ValidationErrorKind::TokenExpired.to_string(), "TOKEN_EXPIRED");
    }
}
