//! Background job scheduler and job implementations.

mod campaign_dispatch;
mod plan_expiry;
mod scheduler;

pub use campaign_dispatch::CampaignDispatchJob;
pub use plan_expiry::PlanExpiryJob;
pub use scheduler::{Job, JobFrequency, JobScheduler};
