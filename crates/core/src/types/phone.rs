//! Egyptian mobile phone numbers.
//!
//! Accepted input forms: `01012345678`, `+201012345678`, `00201012345678`,
//! with optional spaces or dashes, and Arabic-Indic digits. The canonical
//! form is the 11-digit local number.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`PhoneNumber`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PhoneError {
    #[error("Phone number is required")]
    Empty,
    #[error("Phone number can only contain digits")]
    InvalidCharacters,
    #[error("Phone number must be 11 digits starting with 010, 011, 012 or 015")]
    InvalidFormat,
}

/// A validated Egyptian mobile number in canonical 11-digit form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Mobile operator prefixes in use.
    const OPERATOR_PREFIXES: [&'static str; 4] = ["010", "011", "012", "015"];

    /// Parse and canonicalise a phone number.
    ///
    /// # Errors
    ///
    /// Returns a [`PhoneError`] when the input is empty, contains letters, or
    /// is not an Egyptian mobile number.
    pub fn parse(s: &str) -> Result<Self, PhoneError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(PhoneError::Empty);
        }

        let mut digits = String::with_capacity(s.len());
        for (i, ch) in s.chars().enumerate() {
            match ch {
                '0'..='9' => digits.push(ch),
                '\u{0660}'..='\u{0669}' => {
                    let value = u32::from(ch) - 0x0660;
                    digits.push(char::from_digit(value, 10).ok_or(PhoneError::InvalidCharacters)?);
                }
                ' ' | '-' => {}
                '+' if i == 0 => {}
                _ => return Err(PhoneError::InvalidCharacters),
            }
        }

        let local = if let Some(rest) = digits.strip_prefix("0020") {
            format!("0{rest}")
        } else if let Some(rest) = digits.strip_prefix("20").filter(|r| r.len() == 10) {
            format!("0{rest}")
        } else {
            digits
        };

        let valid = local.len() == 11
            && Self::OPERATOR_PREFIXES
                .iter()
                .any(|prefix| local.starts_with(prefix));
        if !valid {
            return Err(PhoneError::InvalidFormat);
        }

        Ok(Self(local))
    }

    /// Returns the canonical number.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_local_number() {
        assert_eq!(PhoneNumber::parse("01012345678").unwrap().as_str(), "01012345678");
        assert_eq!(PhoneNumber::parse("0155 123 4567").unwrap().as_str(), "01551234567");
    }

    #[test]
    fn test_parse_international_prefixes() {
        assert_eq!(PhoneNumber::parse("+201112345678").unwrap().as_str(), "01112345678");
        assert_eq!(PhoneNumber::parse("00201212345678").unwrap().as_str(), "01212345678");
    }

    #[test]
    fn test_parse_arabic_indic_digits() {
        assert_eq!(
            PhoneNumber::parse("٠١٠١٢٣٤٥٦٧٨").unwrap().as_str(),
            "01012345678"
        );
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert_eq!(PhoneNumber::parse(""), Err(PhoneError::Empty));
        assert_eq!(PhoneNumber::parse("0101234567a"), Err(PhoneError::InvalidCharacters));
        assert_eq!(PhoneNumber::parse("0131234567"), Err(PhoneError::InvalidFormat));
        assert_eq!(PhoneNumber::parse("01312345678"), Err(PhoneError::InvalidFormat));
        assert_eq!(PhoneNumber::parse("0101234567"), Err(PhoneError::InvalidFormat));
    }
}
