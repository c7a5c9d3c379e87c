//! Password strength rules for account registration.
//!
//! The backend owns hashing and verification. The storefront only rejects
//! passwords that the backend would refuse anyway, before making a request.

use core::fmt;

/// Reasons a password is rejected.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PasswordError {
    #[error("Password is required")]
    Empty,
    #[error("Password must be at least {min} characters")]
    TooShort { min: usize },
    #[error("Password must be at most {max} characters")]
    TooLong { max: usize },
    #[error("Password must contain at least one letter and one number")]
    MissingLetterOrDigit,
}

/// A password that satisfies the registration rules.
///
/// `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Password(String);

impl Password {
    pub const MIN_LENGTH: usize = 8;
    pub const MAX_LENGTH: usize = 128;

    /// Validate a new password.
    ///
    /// # Errors
    ///
    /// Returns a [`PasswordError`] for the first rule the input breaks.
    pub fn parse(s: &str) -> Result<Self, PasswordError> {
        if s.is_empty() {
            return Err(PasswordError::Empty);
        }

        let len = s.chars().count();
        if len < Self::MIN_LENGTH {
            return Err(PasswordError::TooShort {
                min: Self::MIN_LENGTH,
            });
        }
        if len > Self::MAX_LENGTH {
            return Err(PasswordError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        let has_letter = s.chars().any(char::is_alphabetic);
        let has_digit = s.chars().any(|c| c.is_ascii_digit());
        if !has_letter || !has_digit {
            return Err(PasswordError::MissingLetterOrDigit);
        }

        Ok(Self(s.to_owned()))
    }

    /// Expose the raw value for sending to the backend.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_rules() {
        assert_eq!(Password::parse(""), Err(PasswordError::Empty));
        assert_eq!(
            Password::parse("ab1"),
            Err(PasswordError::TooShort { min: 8 })
        );
        assert_eq!(
            Password::parse("onlyletters"),
            Err(PasswordError::MissingLetterOrDigit)
        );
        assert_eq!(
            Password::parse("12345678"),
            Err(PasswordError::MissingLetterOrDigit)
        );
        assert!(Password::parse("walk1ng-shoes").is_ok());
    }

    #[test]
    fn test_arabic_letters_count_as_letters() {
        assert!(Password::parse("حذاء2024جديد").is_ok());
    }

    #[test]
    fn test_debug_redacts() {
        let password = Password::parse("s3cretpass").ok();
        let debug = format!("{password:?}");
        assert!(!debug.contains("s3cretpass"));
    }
}
