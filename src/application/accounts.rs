//! User and group fixtures created from the command line.

use std::sync::Arc;

use thiserror::Error;

use crate::application::repos::{
    CreateGroupParams, CreateUserParams, GroupsRepo, RepoError, UsersRepo,
};
use crate::domain::entities::{GroupRecord, UserRecord};
use crate::domain::error::DomainError;
use crate::domain::groups::NewGroup;
use crate::domain::users::validate_username;

#[derive(Debug, Error)]
pub enum AccountError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("`{0}` already exists")]
    Exists(String),
    #[error(transparent)]
    Repo(RepoError),
}

impl From<RepoError> for AccountError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Duplicate { constraint } => Self::Exists(constraint),
            other => Self::Repo(other),
        }
    }
}

#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn UsersRepo>,
    groups: Arc<dyn GroupsRepo>,
}

impl AccountService {
    pub fn new(users: Arc<dyn UsersRepo>, groups: Arc<dyn GroupsRepo>) -> Self {
        Self { users, groups }
    }

    pub async fn create_user(
        &self,
        username: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<UserRecord, AccountError> {
        let username = validate_username(username)?;
        if self.users.find_by_username(&username).await?.is_some() {
            return Err(AccountError::Exists(format!("user {username}")));
        }
        Ok(self
            .users
            .create_user(CreateUserParams {
                username,
                first_name: first_name.trim().to_string(),
                last_name: last_name.trim().to_string(),
            })
            .await?)
    }

    pub async fn create_group(
        &self,
        title: &str,
        slug: Option<&str>,
        description: &str,
    ) -> Result<GroupRecord, AccountError> {
        let group = NewGroup::parse(title, slug, description)?;
        if self.groups.find_by_slug(&group.slug).await?.is_some() {
            return Err(AccountError::Exists(format!("group {}", group.slug)));
        }
        Ok(self
            .groups
            .create_group(CreateGroupParams {
                title: group.title,
                slug: group.slug,
                description: group.description,
            })
            .await?)
    }
}
