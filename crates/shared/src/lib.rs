//! Shared utilities and common types for the SEVEN T backend.
//!
//! This crate provides common functionality used across all other crates:
//! - Hashing and webhook signature verification
//! - JWT access tokens
//! - Password hashing with Argon2id
//! - Cursor pagination
//! - Phone number and template validation

pub mod crypto;
pub mod jwt;
pub mod pagination;
pub mod password;
pub mod validation;
