//! Authorization for card disclosure.
//!
//! A caller proves it may reveal a card by presenting a short-lived token
//! bound to that card, together with an HMAC-SHA256 signature minted by a
//! trusted issuer.
//!
//! # Wire format
//!
//! ```text
//! token     = "<cardId>:<issuedAtMillis>"
//! signature = hex(HMAC-SHA256(key, "<cardId>:<token>"))
//! ```
//!
//! # Usage
//!
//! ```
//! use secure_card::authorization::{AuthorizationValidator, SigningKey};
//!
//! let validator = AuthorizationValidator::new(SigningKey::from_bytes(b"k").unwrap());
//! let request = validator
//!     .issuer()
//!     .issue("card_1", 1_000)
//!     .unwrap()
//!     .into_request("card_1");
//!
//! assert!(validator.validate(&request, 2_000).is_accepted());
//! ```

pub mod error;
pub mod signature;
pub mod token;
pub mod types;
pub mod validator;

pub use error::{KeyError, TokenError, ValidationErrorKind};
pub use signature::{SigningKey, SIGNATURE_HEX_LEN};
pub use token::SecureToken;
pub use types::{AuthorizationRequest, IssuedToken, ValidationOutcome};
pub use validator::{AuthorizationValidator, TokenIssuer, MAX_TOKEN_AGE_MILLIS};
