//! askama view models and templates.

pub mod views;
