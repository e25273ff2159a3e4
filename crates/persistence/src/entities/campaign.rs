//! Campaign entities (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::{CampaignStatus, RecipientStatus};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the campaigns table.
#[derive(Debug, Clone, FromRow)]
pub struct CampaignEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub agent_id: Uuid,
    pub name: String,
    pub message_template: String,
    pub status: String,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub total_recipients: i32,
    pub sent_count: i32,
    pub failed_count: i32,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CampaignEntity {
    pub fn status(&self) -> CampaignStatus {
        CampaignStatus::parse(&self.status).unwrap_or(CampaignStatus::Failed)
    }
}

impl From<CampaignEntity> for domain::models::Campaign {
    fn from(entity: CampaignEntity) -> Self {
        Self {
            status: entity.status(),
            campaign_id: entity.id,
            user_id: entity.user_id,
            agent_id: entity.agent_id,
            name: entity.name,
            message_template: entity.message_template,
            scheduled_at: entity.scheduled_at,
            started_at: entity.started_at,
            completed_at: entity.completed_at,
            total_recipients: entity.total_recipients,
            sent_count: entity.sent_count,
            failed_count: entity.failed_count,
            failure_reason: entity.failure_reason,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}

/// Database row mapping for the campaign_recipients table.
#[derive(Debug, Clone, FromRow)]
pub struct RecipientEntity {
    pub id: i64,
    pub campaign_id: Uuid,
    pub phone: String,
    pub name: Option<String>,
    pub status: String,
    pub error: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
}

impl From<RecipientEntity> for domain::models::Recipient {
    fn from(entity: RecipientEntity) -> Self {
        Self {
            id: entity.id,
            campaign_id: entity.campaign_id,
            status: RecipientStatus::parse(&entity.status).unwrap_or(RecipientStatus::Pending),
            phone: entity.phone,
            name: entity.name,
            error: entity.error,
            sent_at: entity.sent_at,
        }
    }
}
