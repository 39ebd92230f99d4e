//! Process configuration loaded from the environment.

use secrecy::{ExposeSecret, SecretString};
use std::env;
use std::str::FromStr;

use crate::authorization::{SigningKey, MAX_TOKEN_AGE_MILLIS};
use crate::error::ConfigError;
use crate::session::{SessionConfig, DEFAULT_TIMEOUT_MILLIS};

/// Signing key as UTF-8 text.
pub const SECRET_KEY_VAR: &str = "SECURE_CARD_SECRET_KEY";
/// Signing key as hex bytes. Wins over [`SECRET_KEY_VAR`].
pub const SECRET_KEY_HEX_VAR: &str = "SECURE_CARD_SECRET_KEY_HEX";
pub const TIMEOUT_VAR: &str = "SECURE_CARD_TIMEOUT_MS";
pub const OBSCURE_ON_BACKGROUND_VAR: &str = "SECURE_CARD_OBSCURE_ON_BACKGROUND";
pub const MAX_TOKEN_AGE_VAR: &str = "SECURE_CARD_MAX_TOKEN_AGE_MS";

#[derive(Debug, Clone)]
pub struct Settings {
    pub signing_key: SigningKey,
    /// Applied when the host does not send a session config.
    pub session: SessionConfig,
    pub max_token_age_millis: i64,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let signing_key = match (
            lookup(SECRET_KEY_HEX_VAR).map(SecretString::new),
            lookup(SECRET_KEY_VAR).map(SecretString::new),
        ) {
            (Some(encoded), _) => SigningKey::from_hex(encoded.expose_secret())?,
            (None, Some(text)) => SigningKey::from_bytes(text.expose_secret().as_bytes())?,
            (None, None) => {
                return Err(ConfigError::MissingKey(SECRET_KEY_VAR, SECRET_KEY_HEX_VAR));
            }
        };

        let session = SessionConfig {
            timeout_millis: parse_var(&lookup, TIMEOUT_VAR, DEFAULT_TIMEOUT_MILLIS)?,
            obscure_on_background: parse_var(&lookup, OBSCURE_ON_BACKGROUND_VAR, true)?,
        };
        session.validate()?;

        let max_token_age_millis = parse_var(&lookup, MAX_TOKEN_AGE_VAR, MAX_TOKEN_AGE_MILLIS)?;
        if max_token_age_millis < 0 {
            return Err(ConfigError::InvalidValue {
                name: MAX_TOKEN_AGE_VAR,
                value: max_token_age_millis.to_string(),
            });
        }

        Ok(Settings {
            signing_key,
            session,
            max_token_age_millis,
        })
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value: raw }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let settings = load(&[(SECRET_KEY_VAR, "k")]).unwrap();
        assert_eq!(settings.session, SessionConfig::default());
        assert_eq!(settings.max_token_age_millis, MAX_TOKEN_AGE_MILLIS);
    }

    #[test]
    fn test_missing_key() {
        assert!(matches!(load(&[]), Err(ConfigError::MissingKey(_, _))));
        assert!(matches!(
            load(&[(SECRET_KEY_VAR, "")]),
            Err(ConfigError::Key(_))
        ));
    }

    #[test]
    fn test_hex_key_wins() {
        let settings = load(&[(SECRET_KEY_HEX_VAR, "6b"), (SECRET_KEY_VAR, "other")]).unwrap();
        let expected = SigningKey::from_bytes(b"k").unwrap();
        assert_eq!(
            settings.signing_key.sign("c", "c:1"),
            expected.sign("c", "c:1")
        );
    }

    #[test]
    fn test_overrides() {
        let settings = load(&[
            (SECRET_KEY_VAR, "k"),
            (TIMEOUT_VAR, "5000"),
            (OBSCURE_ON_BACKGROUND_VAR, "false"),
            (MAX_TOKEN_AGE_VAR, "1000"),
        ])
        .unwrap();
        assert_eq!(settings.session.timeout_millis, 5000);
        assert!(!settings.session.obscure_on_background);
        assert_eq!(settings.max_token_age_millis, 1000);
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            load(&[(SECRET_KEY_VAR, "k"), (TIMEOUT_VAR, "soon")]),
            Err(ConfigError::InvalidValue { name: TIMEOUT_VAR, .. })
        ));
        assert!(matches!(
            load(&[(SECRET_KEY_VAR, "k"), (TIMEOUT_VAR, "0")]),
            Err(ConfigError::ZeroTimeout)
        ));
        assert!(matches!(
            load(&[(SECRET_KEY_VAR, "k"), (MAX_TOKEN_AGE_VAR, "-1")]),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
