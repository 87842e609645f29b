//! Username rules shared by fixtures and route parameters.

use super::error::DomainError;

const MAX_USERNAME_CHARS: usize = 150;

/// Validate a username: 1..=150 characters of letters, digits and `@.+-_`.
pub fn validate_username(raw: &str) -> Result<String, DomainError> {
    let username = raw.trim();
    if username.is_empty() {
        return Err(DomainError::validation(
            "username",
            "username must not be empty",
        ));
    }
    if username.chars().count() > MAX_USERNAME_CHARS {
        return Err(DomainError::validation(
            "username",
            format!("username must be at most {MAX_USERNAME_CHARS} characters"),
        ));
    }
    if !username
        .chars()
        .all(|ch| ch.is_alphanumeric() || matches!(ch, '@' | '.' | '+' | '-' | '_'))
    {
        return Err(DomainError::validation(
            "username",
            "username may contain only letters, digits and @/./+/-/_",
        ));
    }
    Ok(username.to_string())
}
