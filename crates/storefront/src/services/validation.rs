//! Form validation errors shared by the auth and checkout flows.

use serde::Serialize;

/// A validation failure on one form field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// Validation failures in form order.
///
/// Order matters: the first entry is the field the page scrolls to and
/// focuses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Record a failure. Only the first failure per field is kept.
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        if self.get(field).is_none() {
            self.0.push(FieldError {
                field,
                message: message.into(),
            });
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Message for a field, if it failed.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|error| error.field == field)
            .map(|error| error.message.as_str())
    }

    /// The field to focus.
    #[must_use]
    pub fn first_field(&self) -> Option<&'static str> {
        self.0.first().map(|error| error.field)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }

    /// `Ok(value)` when nothing failed.
    ///
    /// # Errors
    ///
    /// Returns `self` when at least one field failed.
    pub fn into_result<T>(self, value: impl FnOnce() -> T) -> Result<T, Self> {
        if self.is_empty() {
            Ok(value())
        } else {
            Err(self)
        }
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let messages: Vec<&str> = self.0.iter().map(|e| e.message.as_str()).collect();
        f.write_str(&messages.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_form_order_and_first_message_per_field() {
        let mut errors = ValidationErrors::new();
        errors.add("phone", "Phone number is required");
        errors.add("full_name", "Name is required");
        errors.add("phone", "second message");

        assert_eq!(errors.first_field(), Some("phone"));
        assert_eq!(errors.get("phone"), Some("Phone number is required"));
        assert_eq!(errors.iter().count(), 2);
        assert_eq!(
            errors.to_string(),
            "Phone number is required; Name is required"
        );
    }
}
