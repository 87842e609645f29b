//! Post form extraction from multipart or urlencoded bodies.

use axum::{
    Form,
    extract::{FromRequest, Request},
    http::{HeaderMap, header::CONTENT_TYPE},
};
use axum_extra::extract::Multipart;
use serde::Deserialize;

use crate::application::error::HttpError;
use crate::application::posts::{ImageUpload, PostDraft};

const SOURCE: &str = "infra::http::forms";

/// Submitted post form, before validation.
#[derive(Debug, Default)]
pub(super) struct PostForm {
    pub text: String,
    pub group: Option<String>,
    pub image: Option<ImageUpload>,
}

impl PostForm {
    pub fn into_draft(self) -> PostDraft {
        PostDraft {
            text: self.text,
            group: self.group,
            image: self.image,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct UrlEncodedPostForm {
    text: String,
    group: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct CommentForm {
    pub text: String,
}

impl<S> FromRequest<S> for PostForm
where
    S: Send + Sync,
{
    type Rejection = HttpError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if !is_multipart(req.headers()) {
            let Form(raw) = Form::<UrlEncodedPostForm>::from_request(req, state)
                .await
                .map_err(|err| invalid_submission(err.status(), err.body_text()))?;
            return Ok(PostForm {
                text: raw.text,
                group: raw.group,
                image: None,
            });
        }

        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|err| invalid_submission(err.status(), err.body_text()))?;
        read_multipart(&mut multipart).await
    }
}

async fn read_multipart(multipart: &mut Multipart) -> Result<PostForm, HttpError> {
    let mut form = PostForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| invalid_submission(err.status(), err.body_text()))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("text") => {
                form.text = field
                    .text()
                    .await
                    .map_err(|err| invalid_submission(err.status(), err.body_text()))?;
            }
            Some("group") => {
                form.group = Some(
                    field
                        .text()
                        .await
                        .map_err(|err| invalid_submission(err.status(), err.body_text()))?,
                );
            }
            Some("image") => {
                let filename = field.file_name().unwrap_or_default().trim().to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|err| invalid_submission(err.status(), err.body_text()))?;
                if !filename.is_empty() {
                    form.image = Some(ImageUpload { filename, data });
                }
            }
            _ => {}
        }
    }

    Ok(form)
}

fn is_multipart(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("multipart/form-data"))
}

fn invalid_submission(status: axum::http::StatusCode, detail: String) -> HttpError {
    HttpError::new(SOURCE, status, "Invalid form submission", detail)
}
