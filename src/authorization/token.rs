//! Token wire format: `"<cardId>:<issuedAtMillis>"`.
//!
//! Only syntax is handled here. Expiry and card binding are the
//! validator's business.

use std::fmt;
use std::str::FromStr;

use super::error::TokenError;

/// Separator between the card id and the issuance timestamp.
pub const TOKEN_SEPARATOR: char = ':';

/// A decoded authorization token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecureToken {
    card_id: String,
    issued_at_millis: i64,
}

impl SecureToken {
    /// Build a token for `card_id` issued at `issued_at_millis` (epoch ms).
    ///
    /// Rejects card ids that would not survive a round trip through
    /// [`SecureToken::decode`].
    pub fn new(card_id: impl Into<String>, issued_at_millis: i64) -> Result<Self, TokenError> {
        let card_id = card_id.into();
        if card_id.is_empty() {
            return Err(TokenError::EmptyCardId);
        }
        if card_id.contains(TOKEN_SEPARATOR) {
            return Err(TokenError::SeparatorInCardId);
        }
        if issued_at_millis < 0 {
            return Err(TokenError::InvalidTimestamp(issued_at_millis.to_string()));
        }
        Ok(Self {
            card_id,
            issued_at_millis,
        })
    }

    pub fn card_id(&self) -> &str {
        &self.card_id
    }

    pub fn issued_at_millis(&self) -> i64 {
        self.issued_at_millis
    }

    pub fn encode(&self) -> String {
        format!("{}{}{}", self.card_id, TOKEN_SEPARATOR, self.issued_at_millis)
    }

    /// Parse a serialized token, splitting on the first `:`.
    pub fn decode(token: &str) -> Result<Self, TokenError> {
        let (card_id, issued_at) = token
            .split_once(TOKEN_SEPARATOR)
            .ok_or(TokenError::MissingSeparator)?;

        if card_id.is_empty() {
            return Err(TokenError::EmptyCardId);
        }

        Ok(Self {
            card_id: card_id.to_string(),
            issued_at_millis: parse_millis(issued_at)?,
        })
    }
}

impl fmt::Display for SecureToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.card_id, TOKEN_SEPARATOR, self.issued_at_millis)
    }
}

impl FromStr for SecureToken {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

/// ASCII digits only: no sign, no whitespace, must fit in `i64`.
fn parse_millis(raw: &str) -> Result<i64, TokenError> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TokenError::InvalidTimestamp(raw.to_string()));
    }
    raw.parse::<i64>()
        .map_err(|_| TokenError::InvalidTimestamp(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode() {
        let token = SecureToken::new("card_1", 1_700_000_000_000).unwrap();
        assert_eq!(token.encode(), "card_1:1700000000000");
        assert_eq!(token.to_string(), token.encode());

        let decoded: SecureToken = "card_1:1700000000000".parse().unwrap();
        assert_eq!(decoded, token);
    }

    #[test]
    fn test_decode_splits_on_first_separator() {
        assert_eq!(
            SecureToken::decode("card_1:12:34"),
            Err(TokenError::InvalidTimestamp("12:34".to_string()))
        );
    }

    #[test]
    fn test_decode_rejects_bad_syntax() {
        assert_eq!(
            SecureToken::decode("card_1"),
            Err(TokenError::MissingSeparator)
        );
        assert_eq!(SecureToken::decode(":123"), Err(TokenError::EmptyCardId));
        assert!(matches!(
            SecureToken::decode("card_1:"),
            Err(TokenError::InvalidTimestamp(_))
        ));
        assert!(matches!(
            SecureToken::decode("card_1:-5"),
            Err(TokenError::InvalidTimestamp(_))
        ));
        assert!(matches!(
            SecureToken::decode("card_1:+5"),
            Err(TokenError::InvalidTimestamp(_))
        ));
        assert!(matches!(
            SecureToken::decode("card_1: 5"),
            Err(TokenError::InvalidTimestamp(_))
        ));
        assert!(matches!(
            SecureToken::decode("card_1:99999999999999999999"),
            Err(TokenError::InvalidTimestamp(_))
        ));
    }

    #[test]
    fn test_new_rejects_unencodable_card_ids() {
        assert_eq!(SecureToken::new("", 1), Err(TokenError::EmptyCardId));
        assert_eq!(
            SecureToken::new("a:b", 1),
            Err(TokenError::SeparatorInCardId)
        );
        assert!(SecureToken::new("card", -1).is_err());
    }
}
