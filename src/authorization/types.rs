//! Request and outcome types for authorization.

use serde::{Deserialize, Serialize};

use super::error::ValidationErrorKind;

/// A disclosure request as handed over by the host.
///
/// Exists only for the duration of one validation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationRequest {
    /// Card the caller wants to disclose.
    pub card_id: String,

    /// Serialized token, `"<cardId>:<issuedAtMillis>"`.
    pub token: String,

    /// Lowercase hex HMAC-SHA256 over `"<cardId>:<token>"`.
    pub signature: String,
}

impl AuthorizationRequest {
    pub fn new(
        card_id: impl Into<String>,
        token: impl Into<String>,
        signature: impl Into<String>,
    ) -> Self {
        Self {
            card_id: card_id.into(),
            token: token.into(),
            signature: signature.into(),
        }
    }
}

/// Result of validating an [`AuthorizationRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ValidationOutcome {
    Accepted,
    Rejected {
        kind: ValidationErrorKind,
        recoverable: bool,
    },
}

impl ValidationOutcome {
    /// Rejection with the recoverability implied by `kind`.
    pub fn rejected(kind: ValidationErrorKind) -> Self {
        ValidationOutcome::Rejected {
            kind,
            recoverable: kind.is_recoverable(),
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, ValidationOutcome::Accepted)
    }

    pub fn rejection(&self) -> Option<ValidationErrorKind> {
        match self {
            ValidationOutcome::Accepted => None,
            ValidationOutcome::Rejected { kind, .. } => Some(*kind),
        }
    }
}

/// Token material minted by [`TokenIssuer`](super::TokenIssuer).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedToken {
    pub token: String,
    pub signature: String,
    pub expires_at_millis: i64,
}

impl IssuedToken {
    /// Pair this token with its card id as a request.
    pub fn into_request(self, card_id: impl Into<String>) -> AuthorizationRequest {
        AuthorizationRequest::new(card_id, self.token, self.signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_from_host_json() {
        let request: AuthorizationRequest = serde_json::from_str(
            r#"{"cardId":"card_1","token":"card_1:5","signature":"ab"}"#,
        )
        .unwrap();
        assert_eq!(request, AuthorizationRequest::new("card_1", "card_1:5", "ab"));
    }

    #[test]
    fn test_outcome_json_shape() {
        let json = serde_json::to_value(ValidationOutcome::rejected(
            ValidationErrorKind::TokenExpired,
        ))
        .unwrap();
        assert_eq!(json["status"], "rejected");
        assert_eq!(json["kind"], "TOKEN_EXPIRED");
        assert_eq!(json["recoverable"], true);

        let json = serde_json::to_value(ValidationOutcome::Accepted).unwrap();
        assert_eq!(json["status"], "accepted");
    }
}
