//! Shared utilities and common types for the licensing back office.
//!
//! This crate provides common functionality used across all other crates:
//! - Webhook payload signing and verification (HMAC-SHA256)
//! - Secret generation
//! - Cursor pagination
//! - Common validation logic

pub mod crypto;
pub mod pagination;
pub mod validation;
