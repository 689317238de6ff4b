//! Persistence layer for the webhook dispatch service.
//!
//! This crate contains:
//! - Database connection management
//! - Entity definitions (database row mappings)
//! - Repository implementations, including the durable work queue

pub mod db;
pub mod entities;
pub mod metrics;
pub mod repositories;
