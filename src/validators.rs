//! Field-level checks run before any user or logo row is written.

use thiserror::Error;
use url::Url;

use crate::error::ValidationError;

pub const USERNAME_MIN_LEN: usize = 2;
pub const USERNAME_MAX_LEN: usize = 150;
pub const PHONE_MAX_LEN: usize = 20;
pub const GOVERNORATE_MAX_LEN: usize = 50;
pub const LOGO_NAME_MAX_LEN: usize = 100;
pub const EMAIL_MAX_LEN: usize = 254;

/// Symbols that may not appear in a username. Arabic and Latin letters,
/// digits, spaces, `_`, `-` and `.` are all fine.
pub const USERNAME_FORBIDDEN: &[char] = &[
    '!', '@', '#', '$', '%', '^', '&', '*', '(', ')', '+', '=', '[', ']', '{', '}', ';', ':',
    '\'', '"', ',', '<', '>', '?', '/', '\\', '|', '`', '~',
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum UsernameError {
    #[error("اسم المستخدم مطلوب")]
    Empty,
    #[error("اسم المستخدم لا يمكن أن يحتوي على رموز خاصة")]
    ForbiddenCharacter(char),
    #[error("اسم المستخدم يجب أن يكون 2 أحرف على الأقل")]
    TooShort(usize),
    #[error("اسم المستخدم يجب ألا يزيد عن 150 حرف")]
    TooLong(usize),
}

impl From<UsernameError> for ValidationError {
    fn from(err: UsernameError) -> Self {
        const FIELD: &str = "username";
        match err {
            UsernameError::Empty => Self::MissingRequiredField { field: FIELD },
            UsernameError::ForbiddenCharacter(character) => Self::InvalidCharacter {
                field: FIELD,
                character,
            },
            UsernameError::TooShort(actual) | UsernameError::TooLong(actual) => Self::InvalidLength {
                field: FIELD,
                min: USERNAME_MIN_LEN,
                max: USERNAME_MAX_LEN,
                actual,
            },
        }
    }
}

/// Checks emptiness, then symbols, then length (in characters, not bytes).
pub fn validate_username(value: &str) -> Result<(), UsernameError> {
    if value.is_empty() {
        return Err(UsernameError::Empty);
    }

    if let Some(c) = value.chars().find(|c| USERNAME_FORBIDDEN.contains(c)) {
        return Err(UsernameError::ForbiddenCharacter(c));
    }

    let len = value.chars().count();
    if len < USERNAME_MIN_LEN {
        return Err(UsernameError::TooShort(len));
    }
    if len > USERNAME_MAX_LEN {
        return Err(UsernameError::TooLong(len));
    }

    Ok(())
}

pub fn validate_phone(value: &str) -> Result<(), ValidationError> {
    let value = required("phone", value)?;
    max_len("phone", value, PHONE_MAX_LEN)
}

pub fn validate_governorate(value: Option<&str>) -> Result<(), ValidationError> {
    match value {
        Some(v) => max_len("governorate", v, GOVERNORATE_MAX_LEN),
        None => Ok(()),
    }
}

pub fn validate_logo_name(value: &str) -> Result<(), ValidationError> {
    max_len("name", value, LOGO_NAME_MAX_LEN)
}

/// `None`, empty and whitespace-only URLs all count as missing. Anything
/// else must be an absolute http(s) URL with a host.
pub fn validate_image_url(value: Option<&str>) -> Result<&str, ValidationError> {
    const FIELD: &str = "image_url";
    let value = required(FIELD, value.unwrap_or_default())?;
    let parsed = Url::parse(value).map_err(|_| ValidationError::InvalidFormat { field: FIELD })?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(ValidationError::InvalidFormat { field: FIELD });
    }
    Ok(value)
}

/// Email is optional; when given it needs a local part, an `@` and a dotted
/// domain, with no whitespace.
pub fn validate_email(value: Option<&str>) -> Result<(), ValidationError> {
    const FIELD: &str = "email";
    let Some(value) = value else {
        return Ok(());
    };
    max_len(FIELD, value, EMAIL_MAX_LEN)?;

    let invalid = ValidationError::InvalidFormat { field: FIELD };
    if value.chars().any(char::is_whitespace) {
        return Err(invalid);
    }
    let (local, domain) = value.rsplit_once('@').ok_or(invalid.clone())?;
    let domain_ok = !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains("..")
        && domain.contains('.');
    if local.is_empty() || local.contains('@') || !domain_ok {
        return Err(invalid);
    }
    Ok(())
}

fn required<'a>(field: &'static str, value: &'a str) -> Result<&'a str, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MissingRequiredField { field });
    }
    Ok(trimmed)
}

fn max_len(field: &'static str, value: &str, max: usize) -> Result<(), ValidationError> {
    let actual = value.chars().count();
    if actual > max {
        return Err(ValidationError::InvalidLength {
            field,
            min: 0,
            max,
            actual,
        });
    }
    Ok(())
}
