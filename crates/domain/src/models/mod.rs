//! Domain models for SEVEN T.

pub mod agent;
pub mod campaign;
pub mod conversation;
pub mod lead;
pub mod order;
pub mod plan;
pub mod product;
pub mod stats;
pub mod user;

pub use agent::Agent;
pub use campaign::{Campaign, CampaignStatus, Recipient, RecipientStatus};
pub use conversation::{Conversation, DeliveryStatus, Message, MessageDirection};
pub use lead::{Lead, LeadStatus};
pub use order::{Order, OrderItem, OrderStatus};
pub use plan::SubscriptionPlan;
pub use product::Product;
pub use stats::DashboardStats;
pub use user::User;
