//! Authorization validator.
//!
//! Checks run in a fixed order and stop at the first failure:
//! 1. Token syntax
//! 2. Token card id matches the requested card
//! 3. Token age is within `[0, max_token_age]`
//! 4. Signature matches the canonical material

use log::{debug, info, warn};
use std::sync::{Arc, PoisonError, RwLock};

use super::error::{TokenError, ValidationErrorKind};
use super::signature::SigningKey;
use super::token::SecureToken;
use super::types::{AuthorizationRequest, IssuedToken, ValidationOutcome};

/// Maximum token age accepted by default (one hour).
pub const MAX_TOKEN_AGE_MILLIS: i64 = 60 * 60 * 1000;

/// Validates disclosure requests against a rotatable signing key.
///
/// Each instance owns its key; there is no process-global secret.
pub struct AuthorizationValidator {
    key: RwLock<Arc<SigningKey>>,
    max_token_age_millis: i64,
}

impl AuthorizationValidator {
    pub fn new(key: SigningKey) -> Self {
        Self {
            key: RwLock::new(Arc::new(key)),
            max_token_age_millis: MAX_TOKEN_AGE_MILLIS,
        }
    }

    /// Override the maximum token age.
    pub fn with_max_token_age(mut self, max_token_age_millis: i64) -> Self {
        self.max_token_age_millis = max_token_age_millis;
        self
    }

    pub fn max_token_age_millis(&self) -> i64 {
        self.max_token_age_millis
    }

    /// Replace the signing key. Validations already running keep the key
    /// they started with.
    pub fn rotate_key(&self, key: SigningKey) {
        let mut current = self.key.write().unwrap_or_else(PoisonError::into_inner);
        *current = Arc::new(key);
        info!("Authorization signing key rotated");
    }

    /// Issuer sharing this validator's current key and token lifetime.
    pub fn issuer(&self) -> TokenIssuer {
        TokenIssuer {
            key: self.current_key(),
            token_lifetime_millis: self.max_token_age_millis,
        }
    }

    /// Decide whether `request` authorizes disclosure at `now_millis`.
    pub fn validate(&self, request: &AuthorizationRequest, now_millis: i64) -> ValidationOutcome {
        let key = self.current_key();
        match self.check(&key, request, now_millis) {
            Ok(()) => {
                info!("Authorization accepted for card {}", request.card_id);
                ValidationOutcome::Accepted
            }
            Err(kind) => {
                warn!(
                    "Authorization rejected for card {}: {}",
                    request.card_id, kind
                );
                ValidationOutcome::rejected(kind)
            }
        }
    }

    fn check(
        &self,
        key: &SigningKey,
        request: &AuthorizationRequest,
        now_millis: i64,
    ) -> Result<(), ValidationErrorKind> {
        // 1. Syntax
        let token = SecureToken::decode(&request.token).map_err(|e| {
            debug!("Token decode failed: {}", e);
            ValidationErrorKind::TokenMalformed
        })?;

        // 2. Card binding
        if token.card_id() != request.card_id {
            debug!(
                "Token bound to card {}, request names {}",
                token.card_id(),
                request.card_id
            );
            return Err(ValidationErrorKind::TokenMalformed);
        }

        // 3. Freshness
        let age = now_millis.saturating_sub(token.issued_at_millis());
        if age < 0 || age > self.max_token_age_millis {
            debug!(
                "Token age {}ms outside [0, {}]",
                age, self.max_token_age_millis
            );
            return Err(ValidationErrorKind::TokenExpired);
        }

        // 4. Signature
        if !key.verify(&request.card_id, &request.token, &request.signature) {
            return Err(ValidationErrorKind::SignatureMismatch);
        }

        Ok(())
    }

    fn current_key(&self) -> Arc<SigningKey> {
        self.key
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Mints tokens and signatures in the wire format the validator accepts.
#[derive(Debug, Clone)]
pub struct TokenIssuer {
    key: Arc<SigningKey>,
    token_lifetime_millis: i64,
}

impl TokenIssuer {
    pub fn new(key: SigningKey) -> Self {
        Self {
            key: Arc::new(key),
            token_lifetime_millis: MAX_TOKEN_AGE_MILLIS,
        }
    }

    /// Issue a token for `card_id` stamped with `now_millis`.
    pub fn issue(&self, card_id: &str, now_millis: i64) -> Result<IssuedToken, TokenError> {
        let token = SecureToken::new(card_id, now_millis)?.encode();
        let signature = self.key.sign(card_id, &token);
        Ok(IssuedToken {
            token,
            signature,
            expires_at_millis: now_millis.saturating_add(self.token_lifetime_millis),
        })
    }
}
