//! Post and comment text rules.

use super::error::DomainError;

/// Number of characters used when a post or comment is summarised in a title.
pub const SUMMARY_CHARS: usize = 15;

/// Normalise submitted post text, rejecting blank input.
pub fn normalize_post_text(raw: &str) -> Result<String, DomainError> {
    normalize_body("text", raw)
}

/// Normalise submitted comment text, rejecting blank input.
pub fn normalize_comment_text(raw: &str) -> Result<String, DomainError> {
    normalize_body("text", raw)
}

fn normalize_body(field: &'static str, raw: &str) -> Result<String, DomainError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(field, "This field is required."));
    }
    Ok(trimmed.replace("\r\n", "\n"))
}

/// First characters of a text, used for page titles and log lines.
pub fn summarize(text: &str) -> String {
    text.chars().take(SUMMARY_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_text_is_rejected() {
        let err = normalize_post_text("  \n\t ").expect_err("blank text rejected");
        assert!(matches!(err, DomainError::Validation { field: "text", .. }));
    }

    #[test]
    fn text_is_trimmed_and_line_endings_normalised() {
        let text = normalize_comment_text("  hello\r\nworld  ").expect("valid text");
        assert_eq!(text, "hello\nworld");
    }

    #[test]
    fn summarize_counts_characters_not_bytes() {
        assert_eq!(summarize("Тестовый текст поста"), "Тестовый текст ");
        assert_eq!(summarize("short"), "short");
    }
}
