//! Protected card fields carried by a disclosure session.
//!
//! Every field is held as a secret: zeroized on drop and redacted from
//! `Debug`. A session drops its fields when it closes.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::fmt;

/// Mask character for hidden PAN digits.
const MASK_CHAR: char = '•';

/// Digits left visible by [`ProtectedCardData::masked_pan`].
const VISIBLE_PAN_DIGITS: usize = 4;

#[derive(Deserialize)]
pub struct ProtectedCardData {
    pan: SecretString,
    cvv: SecretString,
    expiry: SecretString,
    holder: SecretString,
}

impl ProtectedCardData {
    pub fn new(
        pan: impl Into<String>,
        cvv: impl Into<String>,
        expiry: impl Into<String>,
        holder: impl Into<String>,
    ) -> Self {
        Self {
            pan: SecretString::new(pan.into()),
            cvv: SecretString::new(cvv.into()),
            expiry: SecretString::new(expiry.into()),
            holder: SecretString::new(holder.into()),
        }
    }

    pub fn pan(&self) -> &str {
        self.pan.expose_secret()
    }

    pub fn cvv(&self) -> &str {
        self.cvv.expose_secret()
    }

    pub fn expiry(&self) -> &str {
        self.expiry.expose_secret()
    }

    pub fn holder(&self) -> &str {
        self.holder.expose_secret()
    }

    /// PAN with every digit but the last four replaced. Separators are kept.
    pub fn masked_pan(&self) -> String {
        let pan = self.pan.expose_secret();
        let digits = pan.chars().filter(char::is_ascii_digit).count();
        let hidden = digits.saturating_sub(VISIBLE_PAN_DIGITS);

        let mut seen = 0;
        pan.chars()
            .map(|c| {
                if !c.is_ascii_digit() {
                    return c;
                }
                seen += 1;
                if seen <= hidden {
                    MASK_CHAR
                } else {
                    c
                }
            })
            .collect()
    }
}

impl fmt::Debug for ProtectedCardData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtectedCardData")
            .field("pan", &self.masked_pan())
            .finish_non_exhaustive()
    }
}
