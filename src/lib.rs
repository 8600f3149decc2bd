//! Relationship-consistency and cache-coherence core for a chat backend.
//!
//! Groups, contacts, join applications and sessions are kept consistent by
//! the services in [`application`]; derived read views are cached through
//! [`cache`] and invalidated from the events every write publishes.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
