//! Lead entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::LeadStatus;
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the leads table.
#[derive(Debug, Clone, FromRow)]
pub struct LeadEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub conversation_id: Option<Uuid>,
    pub phone: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub status: String,
    pub score: i32,
    pub source: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LeadEntity {
    pub fn status(&self) -> LeadStatus {
        LeadStatus::parse(&self.status).unwrap_or(LeadStatus::New)
    }
}

impl From<LeadEntity> for domain::models::Lead {
    fn from(entity: LeadEntity) -> Self {
        Self {
            status: entity.status(),
            lead_id: entity.id,
            user_id: entity.user_id,
            conversation_id: entity.conversation_id,
            phone: entity.phone,
            name: entity.name,
            email: entity.email,
            score: entity.score,
            source: entity.source,
            notes: entity.notes,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}
