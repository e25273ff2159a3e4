//! Domain layer for the SEVEN T backend.
//!
//! This crate contains:
//! - Domain models (tenants, agents, conversations, catalog, orders, leads, campaigns)
//! - Message analysis (intent classification, order detection, lead scoring)
//! - Seams to external services (messaging gateway, reply generation)

pub mod models;
pub mod services;
