//! Persistence layer for the licensing back office.
//!
//! This crate contains:
//! - Database connection management and embedded migrations
//! - Entity definitions (database row mappings)
//! - Repository implementations
//! - Query timing and pool metrics

pub mod db;
pub mod entities;
pub mod metrics;
pub mod repositories;
