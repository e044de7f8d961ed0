//! Request validation that reports every failing field at once.

use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::error::ApiError;

#[derive(Debug, Default)]
pub struct FieldErrors(HashMap<String, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) -> &mut Self {
        self.0.entry(field.to_string()).or_insert_with(|| message.into());
        self
    }

    pub fn check(&mut self, ok: bool, field: &str, message: &str) -> &mut Self {
        if !ok {
            self.add(field, message);
        }
        self
    }

    /// Non-blank required text
    pub fn require(&mut self, field: &str, value: &str) -> &mut Self {
        self.check(!value.trim().is_empty(), field, "This field is required")
    }

    /// Optional text that must not exceed `max` characters
    pub fn max_len(&mut self, field: &str, value: Option<&str>, max: usize) -> &mut Self {
        if let Some(v) = value {
            if v.chars().count() > max {
                self.add(field, format!("Must be at most {} characters", max));
            }
        }
        self
    }

    pub fn email(&mut self, field: &str, value: Option<&str>) -> &mut Self {
        if let Some(v) = value.map(str::trim).filter(|v| !v.is_empty()) {
            if !is_plausible_email(v) {
                self.add(field, "Invalid email format");
            }
        }
        self
    }

    /// Value drawn from a fixed vocabulary
    pub fn one_of(&mut self, field: &str, value: Option<&str>, allowed: &[&str]) -> &mut Self {
        if let Some(v) = value {
            if !allowed.contains(&v) {
                self.add(field, format!("Must be one of: {}", allowed.join(", ")));
            }
        }
        self
    }

    /// Optional decimal that fits a NUMERIC column: at most `max` and `scale`
    /// fraction digits (trailing zeros do not count)
    pub fn decimal(&mut self, field: &str, value: Option<Decimal>, max: Decimal, scale: u32) -> &mut Self {
        if let Some(v) = value {
            if v.normalize().scale() > scale {
                self.add(field, format!("At most {} decimal places", scale));
            } else if v > max {
                self.add(field, format!("Must not exceed {}", max));
            }
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_result(self) -> Result<(), ApiError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(ApiError::validation_error("Validation failed", Some(self.0)))
        }
    }
}

fn is_plausible_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace)
        && !domain.contains('@')
}

/// Trimmed, None when blank
pub fn clean(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_multiple_field_errors() {
        let mut errors = FieldErrors::new();
        errors
            .require("name", "  ")
            .email("email", Some("nope"))
            .one_of("status", Some("paused"), &["active", "closed"]);
        let err = errors.into_result().unwrap_err();
        let body = err.to_json();
        assert_eq!(body["field_errors"]["name"], "This field is required");
        assert_eq!(body["field_errors"]["email"], "Invalid email format");
        assert_eq!(body["field_errors"]["status"], "Must be one of: active, closed");
    }

    #[test]
    fn first_message_per_field_wins() {
        let mut errors = FieldErrors::new();
        errors.require("name", "").max_len("name", Some(""), 0);
        let body = errors.into_result().unwrap_err().to_json();
        assert_eq!(body["field_errors"]["name"], "This field is required");
    }

    #[test]
    fn decimals_respect_column_precision() {
        let max: Decimal = "999.99".parse().unwrap();
        let mut errors = FieldErrors::new();
        errors
            .decimal("fine", Some("12.50".parse().unwrap()), max, 2)
            .decimal("trailing", Some("12.5000".parse().unwrap()), max, 2)
            .decimal("scale", Some("1.005".parse().unwrap()), max, 2)
            .decimal("big", Some("1000".parse().unwrap()), max, 2)
            .decimal("absent", None, max, 2);
        let body = errors.into_result().unwrap_err().to_json();
        let fields = body["field_errors"].as_object().unwrap();
        assert_eq!(fields.len(), 2, "{}", body);
        assert_eq!(body["field_errors"]["scale"], "At most 2 decimal places");
        assert_eq!(body["field_errors"]["big"], "Must not exceed 999.99");
    }

    #[test]
    fn accepts_valid_input() {
        let mut errors = FieldErrors::new();
        errors
            .require("name", "Acme")
            .email("email", Some("ops@acme.co.uk"))
            .email("other", None)
            .one_of("status", None, &["active"]);
        assert!(errors.into_result().is_ok());
    }

    #[test]
    fn email_shapes() {
        assert!(is_plausible_email("a@b.co"));
        assert!(!is_plausible_email("a@b"));
        assert!(!is_plausible_email("@b.co"));
        assert!(!is_plausible_email("a b@c.co"));
        assert!(!is_plausible_email("a@b@c.co"));
    }

    #[test]
    fn clean_trims_and_drops_blanks() {
        assert_eq!(clean(Some("  x ".into())).as_deref(), Some("x"));
        assert_eq!(clean(Some("   ".into())), None);
    }
}
