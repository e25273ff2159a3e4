//! Agent entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the agents table.
#[derive(Debug, Clone, FromRow)]
pub struct AgentEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub phone_number: String,
    pub whatsapp_phone_number_id: String,
    pub system_prompt: String,
    pub language: String,
    pub fallback_reply: Option<String>,
    pub refusal_reply: Option<String>,
    pub auto_reply: bool,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<AgentEntity> for domain::models::Agent {
    fn from(entity: AgentEntity) -> Self {
        Self {
            agent_id: entity.id,
            user_id: entity.user_id,
            name: entity.name,
            phone_number: entity.phone_number,
            whatsapp_phone_number_id: entity.whatsapp_phone_number_id,
            system_prompt: entity.system_prompt,
            language: entity.language,
            fallback_reply: entity.fallback_reply,
            refusal_reply: entity.refusal_reply,
            auto_reply: entity.auto_reply,
            active: entity.active,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}
