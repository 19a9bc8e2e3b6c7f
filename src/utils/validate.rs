// src/utils/validate.rs

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;
use validator::ValidationError;

static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w.@+-]+$").expect("invalid username regex"));

static SLUG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-a-zA-Z0-9_]+$").expect("invalid slug regex"));

fn error(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Borrowed(message));
    err
}

/// Username pattern check only. The admin user surface accepts any name
/// matching the pattern, reserved names included.
pub fn validate_username_pattern(value: &str) -> Result<(), ValidationError> {
    if !USERNAME_RE.is_match(value) {
        return Err(error(
            "username_pattern",
            "Username may contain only letters, digits and @/./+/-/_ characters.",
        ));
    }
    Ok(())
}

/// The literal "me" is reserved for the self-profile route and may not be
/// claimed at signup or self-update, in any casing.
pub fn validate_not_reserved(value: &str) -> Result<(), ValidationError> {
    if value.eq_ignore_ascii_case("me") {
        return Err(error("reserved", "The name 'me' is reserved."));
    }
    Ok(())
}

/// Full username rule for signup and self-update: pattern plus the
/// reserved-name check.
pub fn validate_username(value: &str) -> Result<(), ValidationError> {
    validate_username_pattern(value)?;
    validate_not_reserved(value)?;
    Ok(())
}

pub fn validate_slug(value: &str) -> Result<(), ValidationError> {
    if !SLUG_RE.is_match(value) {
        return Err(error(
            "slug_pattern",
            "Slug may contain only letters, digits, hyphens and underscores.",
        ));
    }
    Ok(())
}
