//! Follow edges between readers and authors.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::application::repos::{FollowsRepo, RepoError, UsersRepo};
use crate::application::sessions::Identity;
use crate::domain::entities::UserRecord;

#[derive(Debug, Error)]
pub enum FollowError {
    #[error("author `{0}` not found")]
    UnknownAuthor(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Clone)]
pub struct FollowService {
    follows: Arc<dyn FollowsRepo>,
    users: Arc<dyn UsersRepo>,
}

impl FollowService {
    pub fn new(follows: Arc<dyn FollowsRepo>, users: Arc<dyn UsersRepo>) -> Self {
        Self { follows, users }
    }

    /// Create the edge if absent. Following yourself is a no-op.
    pub async fn follow(
        &self,
        user: &Identity,
        author_username: &str,
    ) -> Result<UserRecord, FollowError> {
        let author = self.author(author_username).await?;
        if author.id == user.user_id {
            return Ok(author);
        }

        if self.follows.follow(user.user_id, author.id).await? {
            info!(
                target = "application::follows",
                follower = %user.username,
                author = %author.username,
                "follow created"
            );
        }
        Ok(author)
    }

    /// Delete the edge if present.
    pub async fn unfollow(
        &self,
        user: &Identity,
        author_username: &str,
    ) -> Result<UserRecord, FollowError> {
        let author = self.author(author_username).await?;
        if self.follows.unfollow(user.user_id, author.id).await? {
            info!(
                target = "application::follows",
                follower = %user.username,
                author = %author.username,
                "follow removed"
            );
        }
        Ok(author)
    }

    async fn author(&self, username: &str) -> Result<UserRecord, FollowError> {
        self.users
            .find_by_username(username)
            .await?
            .ok_or_else(|| FollowError::UnknownAuthor(username.to_string()))
    }
}
