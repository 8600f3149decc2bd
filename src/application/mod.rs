//! Application services: relationship rules, cascades and read projections.

pub mod applies;
pub mod contacts;
pub mod core;
pub mod error;
pub mod groups;
pub(crate) mod guards;
pub mod messages;
pub mod projections;
pub mod repos;
pub mod reply;
pub mod sessions;
pub mod users;
