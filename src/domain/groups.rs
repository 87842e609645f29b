//! Group fixture rules.

use slug::slugify;

use super::error::DomainError;

const MAX_TITLE_CHARS: usize = 200;

/// Validated input for a new group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGroup {
    pub title: String,
    pub slug: String,
    pub description: String,
}

impl NewGroup {
    /// Build a group, deriving the slug from the title when none is supplied.
    pub fn parse(
        title: &str,
        slug: Option<&str>,
        description: &str,
    ) -> Result<Self, DomainError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(DomainError::validation("title", "title must not be empty"));
        }
        if title.chars().count() > MAX_TITLE_CHARS {
            return Err(DomainError::validation(
                "title",
                format!("title must be at most {MAX_TITLE_CHARS} characters"),
            ));
        }

        let slug = match slug.map(str::trim).filter(|value| !value.is_empty()) {
            Some(value) => {
                if !is_valid_slug(value) {
                    return Err(DomainError::validation(
                        "slug",
                        "slug may contain only lowercase letters, digits, `-` and `_`",
                    ));
                }
                value.to_string()
            }
            None => {
                let derived = slugify(title);
                if derived.is_empty() {
                    return Err(DomainError::validation(
                        "slug",
                        "slug could not be derived from the title",
                    ));
                }
                derived
            }
        };

        Ok(Self {
            title: title.to_string(),
            slug,
            description: description.trim().to_string(),
        })
    }
}

pub fn is_valid_slug(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-' || ch == '_')
}
