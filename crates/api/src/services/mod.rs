//! Application services and external integrations.

pub mod assistant;
pub mod auth;
pub mod campaign_sender;
pub mod events;
pub mod message_pipeline;
pub mod order_workflow;
pub mod outbox;
pub mod whatsapp;

pub use assistant::ChatCompletionClient;
pub use auth::{AuthError, AuthService};
pub use campaign_sender::{CampaignError, CampaignSender};
pub use events::{EventHub, TenantEvent};
pub use message_pipeline::{MessagePipeline, PipelineError, PipelineOutcome, PipelineSettings};
pub use order_workflow::{OrderWorkflow, OrderWorkflowError};
pub use outbox::Outbox;
pub use whatsapp::{LoggingGateway, WhatsAppCloudGateway};
