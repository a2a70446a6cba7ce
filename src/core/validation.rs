// Input validation shared by the signup and admin flows

use once_cell::sync::Lazy;
use regex::Regex;

use crate::core::strong_types::EmailAddress;
use crate::error::{AppError, AppResult};

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[0-9 ().\-]+$").expect("valid phone regex"));

static SLUG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("valid slug regex"));

/// Trim and require a non-empty value
pub fn required(field: &'static str, value: &str) -> AppResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation(field, "is required"));
    }
    Ok(trimmed.to_string())
}

/// Trim an optional value, mapping blank input to None
pub fn optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub fn parse_email(raw: &str) -> AppResult<EmailAddress> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation("email", "is required"));
    }
    if !EMAIL_RE.is_match(trimmed) {
        return Err(AppError::validation(
            "email",
            "please enter a valid email address",
        ));
    }
    Ok(EmailAddress::normalized(trimmed))
}

/// Phone is only format-checked when present: 7 to 15 digits, with an
/// optional leading `+` and common separators.
pub fn parse_phone(raw: Option<&str>) -> AppResult<Option<String>> {
    let Some(phone) = optional(raw) else {
        return Ok(None);
    };
    let digits = phone.chars().filter(char::is_ascii_digit).count();
    if !PHONE_RE.is_match(&phone) || !(7..=15).contains(&digits) {
        return Err(AppError::validation(
            "phone",
            "please enter a valid phone number",
        ));
    }
    Ok(Some(phone))
}

pub fn parse_slug(raw: &str) -> AppResult<String> {
    let slug = required("slug", raw)?;
    if !SLUG_RE.is_match(&slug) {
        return Err(AppError::validation(
            "slug",
            "use lowercase letters, digits and dashes (e.g. spring-cleanup-2025)",
        ));
    }
    Ok(slug)
}

pub fn parse_capacity(capacity: i32) -> AppResult<i32> {
    if capacity < 1 {
        return Err(AppError::validation("capacity", "must be at least 1"));
    }
    Ok(capacity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_rules() {
        assert_eq!(parse_email(" Jane@Example.org ").unwrap().as_str(), "jane@example.org");
        assert!(matches!(
            parse_email("jane@example"),
            Err(AppError::ValidationFailed { field: "email", .. })
        ));
        assert!(parse_email("").is_err());
        assert!(parse_email("two words@example.org").is_err());
    }

    #[test]
    fn test_phone_is_optional_but_checked() {
        assert_eq!(parse_phone(None).unwrap(), None);
        assert_eq!(parse_phone(Some("   ")).unwrap(), None);
        assert_eq!(
            parse_phone(Some("+1 (555) 123-4567")).unwrap(),
            Some("+1 (555) 123-4567".to_string())
        );
        assert!(parse_phone(Some("123")).is_err());
        assert!(parse_phone(Some("call me")).is_err());
    }

    #[test]
    fn test_capacity_must_be_positive() {
        assert_eq!(parse_capacity(1).unwrap(), 1);
        assert!(matches!(
            parse_capacity(0),
            Err(AppError::ValidationFailed { field: "capacity", .. })
        ));
    }

    #[test]
    fn test_slug_rules() {
        assert_eq!(parse_slug("spring-cleanup-2025").unwrap(), "spring-cleanup-2025");
        assert!(parse_slug("Spring Cleanup").is_err());
        assert!(parse_slug("trailing-").is_err());
        assert!(parse_slug("").is_err());
    }
}
