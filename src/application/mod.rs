//! Application services layer.

pub mod accounts;
pub mod error;
pub mod follows;
pub mod listing;
pub mod pagination;
pub mod posts;
pub mod repos;
pub mod sessions;
