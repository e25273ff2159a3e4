//! HTTP route handlers.

pub mod agents;
pub mod auth;
pub mod campaigns;
pub mod conversations;
pub mod events;
pub mod health;
pub mod leads;
pub mod me;
pub mod orders;
pub mod plans;
pub mod products;
pub mod stats;
pub mod webhooks;
