//! Repository implementations for database operations.

pub mod agent;
pub mod campaign;
pub mod conversation;
pub mod lead;
pub mod order;
pub mod product;
pub mod stats;
pub mod user;

pub use agent::AgentRepository;
pub use campaign::{CampaignRepository, RecoveryReport};
pub use conversation::{ConversationRepository, MessageRepository};
pub use lead::LeadRepository;
pub use order::{OrderRepository, OrderUpdateError};
pub use product::ProductRepository;
pub use stats::StatsRepository;
pub use user::{PlanRepository, UserRepository};
