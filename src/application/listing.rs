//! Newest-first post listings: index, group, profile and followed authors.

use std::num::NonZeroU32;
use std::sync::Arc;

use thiserror::Error;

use crate::application::pagination::{Page, PageRequest};
use crate::application::repos::{FollowsRepo, GroupsRepo, PostScope, PostsRepo, RepoError, UsersRepo};
use crate::application::sessions::Identity;
use crate::domain::entities::{GroupRecord, PostRecord, UserRecord};

#[derive(Debug, Error)]
pub enum ListingError {
    #[error("group `{0}` not found")]
    UnknownGroup(String),
    #[error("author `{0}` not found")]
    UnknownAuthor(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone)]
pub struct GroupListing {
    pub group: GroupRecord,
    pub page: Page<PostRecord>,
}

#[derive(Debug, Clone)]
pub struct ProfileListing {
    pub author: UserRecord,
    pub post_count: u64,
    /// Whether the viewer follows this author; always false for anonymous viewers.
    pub following: bool,
    /// Whether the viewer may follow this author at all.
    pub can_follow: bool,
    pub page: Page<PostRecord>,
}

#[derive(Clone)]
pub struct ListingService {
    posts: Arc<dyn PostsRepo>,
    groups: Arc<dyn GroupsRepo>,
    users: Arc<dyn UsersRepo>,
    follows: Arc<dyn FollowsRepo>,
    page_size: NonZeroU32,
}

impl ListingService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        groups: Arc<dyn GroupsRepo>,
        users: Arc<dyn UsersRepo>,
        follows: Arc<dyn FollowsRepo>,
        page_size: NonZeroU32,
    ) -> Self {
        Self {
            posts,
            groups,
            users,
            follows,
            page_size,
        }
    }

    /// Interpret a raw `?page=` value with the configured page size.
    pub fn page_request(&self, raw: Option<&str>) -> PageRequest {
        PageRequest::from_query(raw, self.page_size)
    }

    pub async fn index(&self, page: PageRequest) -> Result<Page<PostRecord>, ListingError> {
        Ok(self.posts.list_posts(PostScope::All, page).await?)
    }

    pub async fn group(&self, slug: &str, page: PageRequest) -> Result<GroupListing, ListingError> {
        let group = self
            .groups
            .find_by_slug(slug)
            .await?
            .ok_or_else(|| ListingError::UnknownGroup(slug.to_string()))?;
        let page = self.posts.list_posts(PostScope::Group(group.id), page).await?;
        Ok(GroupListing { group, page })
    }

    pub async fn profile(
        &self,
        username: &str,
        page: PageRequest,
        viewer: Option<&Identity>,
    ) -> Result<ProfileListing, ListingError> {
        let author = self
            .users
            .find_by_username(username)
            .await?
            .ok_or_else(|| ListingError::UnknownAuthor(username.to_string()))?;

        let scope = PostScope::Author(author.id);
        let page = self.posts.list_posts(scope, page).await?;
        let post_count = page.total_items;

        let (following, can_follow) = match viewer {
            Some(viewer) if viewer.user_id != author.id => (
                self.follows.is_following(viewer.user_id, author.id).await?,
                true,
            ),
            _ => (false, false),
        };

        Ok(ProfileListing {
            author,
            post_count,
            following,
            can_follow,
            page,
        })
    }

    /// Posts by authors the viewer follows; empty when they follow nobody.
    pub async fn follow_feed(
        &self,
        viewer: &Identity,
        page: PageRequest,
    ) -> Result<Page<PostRecord>, ListingError> {
        Ok(self
            .posts
            .list_posts(PostScope::FollowedBy(viewer.user_id), page)
            .await?)
    }
}
