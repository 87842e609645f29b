//! Post detail, authoring and commenting.

use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;
use tracing::{debug, info};

use crate::application::repos::{
    CommentsRepo, CreateCommentParams, CreatePostParams, GroupsRepo, ImageStore,
    ImageStoreError, PostScope, PostsRepo, PostsWriteRepo, RepoError, UpdatePostParams,
};
use crate::application::sessions::Identity;
use crate::domain::entities::{CommentRecord, GroupRecord, PostRecord};
use crate::domain::error::DomainError;
use crate::domain::posts::{normalize_comment_text, normalize_post_text, summarize};

const INVALID_GROUP: &str = "Select a valid choice. That choice is not one of the available choices.";
const INVALID_IMAGE: &str = "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";
const EMPTY_IMAGE: &str = "The submitted file is empty.";

#[derive(Debug, Error)]
pub enum PostError {
    #[error("post {0} not found")]
    NotFound(i64),
    #[error("submitted post form is invalid")]
    Invalid(FieldErrors),
    #[error("failed to store image: {0}")]
    Storage(#[source] ImageStoreError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// An image submitted with a post form.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub filename: String,
    pub data: Bytes,
}

/// Raw post form values as submitted.
#[derive(Debug, Clone, Default)]
pub struct PostDraft {
    pub text: String,
    /// Group id as submitted; empty means no group.
    pub group: Option<String>,
    pub image: Option<ImageUpload>,
}

/// Per-field validation messages for the post form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors {
    pub text: Vec<String>,
    pub group: Vec<String>,
    pub image: Vec<String>,
}

impl FieldErrors {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.group.is_empty() && self.image.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct PostDetail {
    pub post: PostRecord,
    pub comments: Vec<CommentRecord>,
    pub author_post_count: u64,
}

/// Result of an edit attempt.
#[derive(Debug, Clone)]
pub enum EditOutcome {
    Updated(PostRecord),
    /// The editor is not the author; nothing was changed.
    NotAuthor(i64),
}

/// Prefilled edit form, or a refusal for non-authors.
#[derive(Debug, Clone)]
pub enum EditAccess {
    Author(PostRecord),
    NotAuthor(i64),
}

struct ValidDraft {
    text: String,
    group_id: Option<i64>,
    image: Option<ImageUpload>,
}

#[derive(Clone)]
pub struct PostService {
    posts: Arc<dyn PostsRepo>,
    writer: Arc<dyn PostsWriteRepo>,
    comments: Arc<dyn CommentsRepo>,
    groups: Arc<dyn GroupsRepo>,
    media: Arc<dyn ImageStore>,
}

impl PostService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        writer: Arc<dyn PostsWriteRepo>,
        comments: Arc<dyn CommentsRepo>,
        groups: Arc<dyn GroupsRepo>,
        media: Arc<dyn ImageStore>,
    ) -> Self {
        Self {
            posts,
            writer,
            comments,
            groups,
            media,
        }
    }

    /// Choices for the group field.
    pub async fn groups(&self) -> Result<Vec<GroupRecord>, PostError> {
        Ok(self.groups.list_groups().await?)
    }

    pub async fn detail(&self, id: i64) -> Result<PostDetail, PostError> {
        let post = self.find(id).await?;
        let comments = self.comments.list_for_post(id).await?;
        let author_post_count = self
            .posts
            .count_posts(PostScope::Author(post.author.id))
            .await?;
        Ok(PostDetail {
            post,
            comments,
            author_post_count,
        })
    }

    pub async fn create(&self, author: &Identity, draft: PostDraft) -> Result<PostRecord, PostError> {
        let valid = self.validate(draft).await?;
        let image = self.store_image(valid.image).await?;

        let post = self
            .writer
            .create_post(CreatePostParams {
                author_id: author.user_id,
                text: valid.text,
                group_id: valid.group_id,
                image,
            })
            .await?;

        info!(
            target = "application::posts",
            post_id = post.id,
            author = %author.username,
            summary = %summarize(&post.text),
            "post created"
        );
        Ok(post)
    }

    pub async fn edit_form(&self, editor: &Identity, id: i64) -> Result<EditAccess, PostError> {
        let post = self.find(id).await?;
        if post.author.id != editor.user_id {
            return Ok(EditAccess::NotAuthor(id));
        }
        Ok(EditAccess::Author(post))
    }

    /// Only the author may edit; a submission without an image keeps the stored one.
    pub async fn edit(
        &self,
        editor: &Identity,
        id: i64,
        draft: PostDraft,
    ) -> Result<EditOutcome, PostError> {
        let existing = self.find(id).await?;
        if existing.author.id != editor.user_id {
            debug!(
                target = "application::posts",
                post_id = id,
                editor = %editor.username,
                "edit refused for non-author"
            );
            return Ok(EditOutcome::NotAuthor(id));
        }

        let valid = self.validate(draft).await?;
        let image = match self.store_image(valid.image).await? {
            Some(path) => Some(path),
            None => existing.image,
        };

        let post = self
            .writer
            .update_post(UpdatePostParams {
                id,
                text: valid.text,
                group_id: valid.group_id,
                image,
            })
            .await?;

        info!(target = "application::posts", post_id = id, "post updated");
        Ok(EditOutcome::Updated(post))
    }

    /// Blank comments create nothing; an unknown post is an error.
    pub async fn add_comment(
        &self,
        author: &Identity,
        post_id: i64,
        text: &str,
    ) -> Result<Option<CommentRecord>, PostError> {
        self.find(post_id).await?;

        let Ok(text) = normalize_comment_text(text) else {
            debug!(
                target = "application::posts",
                post_id, "blank comment ignored"
            );
            return Ok(None);
        };

        let comment = self
            .comments
            .create_comment(CreateCommentParams {
                post_id,
                author_id: author.user_id,
                text,
            })
            .await?;
        Ok(Some(comment))
    }

    async fn find(&self, id: i64) -> Result<PostRecord, PostError> {
        self.posts
            .find_by_id(id)
            .await?
            .ok_or(PostError::NotFound(id))
    }

    async fn validate(&self, draft: PostDraft) -> Result<ValidDraft, PostError> {
        let mut errors = FieldErrors::default();

        let text = match normalize_post_text(&draft.text) {
            Ok(text) => Some(text),
            Err(err) => {
                errors.text.push(validation_message(err));
                None
            }
        };

        let group_id = match draft
            .group
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
        {
            None => None,
            Some(raw) => {
                let found = match raw.parse::<i64>() {
                    Ok(id) => self.groups.find_by_id(id).await?.map(|group| group.id),
                    Err(_) => None,
                };
                if found.is_none() {
                    errors.group.push(INVALID_GROUP.to_string());
                }
                found
            }
        };

        let image = draft.image.filter(|upload| !upload.filename.is_empty());
        if let Some(upload) = image.as_ref() {
            match self.media.check(&upload.data) {
                Ok(()) => {}
                Err(ImageStoreError::Empty) => errors.image.push(EMPTY_IMAGE.to_string()),
                Err(_) => errors.image.push(INVALID_IMAGE.to_string()),
            }
        }

        match text {
            Some(text) if errors.is_empty() => Ok(ValidDraft {
                text,
                group_id,
                image,
            }),
            _ => Err(PostError::Invalid(errors)),
        }
    }

    async fn store_image(&self, image: Option<ImageUpload>) -> Result<Option<String>, PostError> {
        match image {
            Some(upload) => self
                .media
                .store(&upload.filename, upload.data)
                .await
                .map(Some)
                .map_err(PostError::Storage),
            None => Ok(None),
        }
    }
}

fn validation_message(err: DomainError) -> String {
    match err {
        DomainError::Validation { message, .. } => message,
        other => other.to_string(),
    }
}
