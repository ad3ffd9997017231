use regex::Regex;
use std::sync::LazyLock;

use crate::error::{AppError, AppResult};

/// International dialing plan: optional `+`, no leading zero, 2 to 15 digits in total.
/// ASCII digits only, so one number has exactly one canonical spelling.
static PHONE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[1-9][0-9]{1,14}$").expect("phone regex is valid"));

const NAME_MIN_CHARS: usize = 2;
const NAME_MAX_CHARS: usize = 100;

/// Canonicalize a raw phone number: drop whitespace and the `-`, `(`, `)` separators,
/// then make sure it starts with `+`.
///
/// Two inputs that only differ in formatting map to the same string, and
/// `normalize_phone(normalize_phone(x)) == normalize_phone(x)`.
pub fn normalize_phone(raw: &str) -> String {
    let stripped: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '-' | '(' | ')'))
        .collect();

    if stripped.starts_with('+') {
        stripped
    } else {
        format!("+{stripped}")
    }
}

/// Validate a canonical phone number.
///
/// Canonical numbers always carry the `+`; a bare digit string is rejected here even
/// though the dialing-plan shape itself tolerates it.
pub fn validate_phone(phone: &str) -> AppResult<()> {
    if phone.is_empty() {
        return Err(AppError::ValidationError(
            "Phone number cannot be empty".to_string(),
        ));
    }

    if !phone.starts_with('+') || !PHONE_REGEX.is_match(phone) {
        return Err(AppError::ValidationError(
            "Invalid phone number format. Expected international format (e.g., +962791234567)"
                .to_string(),
        ));
    }

    Ok(())
}

/// Normalize then validate in one step; every lookup key goes through here.
pub fn canonical_phone(raw: &str) -> AppResult<String> {
    let phone = normalize_phone(raw);
    validate_phone(&phone)?;
    Ok(phone)
}

/// Display names are trimmed and must be 2 to 100 characters long.
pub fn validate_name(name: &str) -> AppResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::ValidationError("Name cannot be empty".to_string()));
    }

    let len = name.chars().count();
    if len < NAME_MIN_CHARS {
        return Err(AppError::ValidationError(format!(
            "Name must be at least {NAME_MIN_CHARS} characters long"
        )));
    }
    if len > NAME_MAX_CHARS {
        return Err(AppError::ValidationError(format!(
            "Name must not exceed {NAME_MAX_CHARS} characters"
        )));
    }

    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_phone() {
        assert!(validate_phone("+962791234567").is_ok());
        assert!(validate_phone("+12025551234").is_ok());
        assert!(validate_phone("+12").is_ok());

        assert!(validate_phone("").is_err());
        assert!(validate_phone("962791234567").is_err());
        assert!(validate_phone("+0791234567").is_err());
        assert!(validate_phone("+96279ABCDEFG").is_err());
        assert!(validate_phone("+1").is_err());
        assert!(validate_phone("+1234567890123456").is_err());
    }

    #[test]
    fn test_normalize_phone() {
        assert_eq!(normalize_phone("+962 79 123 4567"), "+962791234567");
        assert_eq!(normalize_phone("+962-79-123-4567"), "+962791234567");
        assert_eq!(normalize_phone("+962(79)1234567"), "+962791234567");
        assert_eq!(normalize_phone("962791234567"), "+962791234567");
        assert_eq!(normalize_phone(" +962791234567\t"), "+962791234567");
        assert_eq!(normalize_phone("+962791234567"), "+962791234567");
    }

    #[test]
    fn test_normalize_is_idempotent_and_converges() {
        let inputs = [
            "+962 79 123 4567",
            "962-79-123-4567",
            "(962) 79 1234567",
            "+962791234567",
        ];
        for raw in inputs {
            let once = normalize_phone(raw);
            assert_eq!(normalize_phone(&once), once);
            assert_eq!(once, "+962791234567");
        }
    }

    #[test]
    fn test_canonical_phone() {
        assert_eq!(canonical_phone("+1 (202) 555-1234").unwrap(), "+12025551234");
        assert!(canonical_phone("").is_err());
        assert!(canonical_phone("0791234567").is_err());
        assert!(canonical_phone("+962.79.123").is_err());
    }

    #[test]
    fn test_validate_name() {
        assert_eq!(validate_name("  John Doe ").unwrap(), "John Doe");
        assert!(validate_name("أحمد علي").is_ok());
        assert!(validate_name("Ali123").is_ok());
        assert!(validate_name("A").is_err());
        assert!(validate_name("").is_err());
        assert!(validate_name("   ").is_err());
        assert!(validate_name(&"a".repeat(101)).is_err());
        assert!(validate_name(&"a".repeat(100)).is_ok());
    }

    #[test]
    fn test_non_ascii_digits_are_rejected() {
        // Arabic-Indic and full-width spellings of +962791234567.
        for raw in ["+9٦٢٧٩١٢٣٤٥٦٧", "+٩٦٢٧٩١٢٣٤٥٦٧", "+９６２７９１２３４５６７"] {
            assert!(validate_phone(raw).is_err(), "{raw} should be rejected");
            assert!(matches!(
                canonical_phone(raw),
                Err(AppError::ValidationError(_))
            ));
        }
    }
}
