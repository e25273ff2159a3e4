//! Database entity definitions.
//!
//! Entities are direct mappings to database rows.

pub mod agent;
pub mod campaign;
pub mod conversation;
pub mod lead;
pub mod order;
pub mod product;
pub mod user;

pub use agent::AgentEntity;
pub use campaign::{CampaignEntity, RecipientEntity};
pub use conversation::{ConversationEntity, MessageEntity};
pub use lead::LeadEntity;
pub use order::{OrderEntity, OrderItemEntity};
pub use product::ProductEntity;
pub use user::{PlanEntity, UserEntity};
