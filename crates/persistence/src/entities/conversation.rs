//! Conversation and message entities (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::{DeliveryStatus, MessageDirection};
use domain::services::MessageIntent;
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the conversations table.
#[derive(Debug, Clone, FromRow)]
pub struct ConversationEntity {
    pub id: Uuid,
    pub agent_id: Uuid,
    pub user_id: Uuid,
    pub contact_phone: String,
    pub contact_name: Option<String>,
    pub ai_paused: bool,
    pub last_message_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<ConversationEntity> for domain::models::Conversation {
    fn from(entity: ConversationEntity) -> Self {
        Self {
            conversation_id: entity.id,
            agent_id: entity.agent_id,
            user_id: entity.user_id,
            contact_phone: entity.contact_phone,
            contact_name: entity.contact_name,
            ai_paused: entity.ai_paused,
            last_message_at: entity.last_message_at,
            created_at: entity.created_at,
        }
    }
}

/// Database row mapping for the messages table.
#[derive(Debug, Clone, FromRow)]
pub struct MessageEntity {
    pub id: i64,
    pub message_id: Uuid,
    pub conversation_id: Uuid,
    pub direction: String,
    pub body: String,
    pub intent: Option<String>,
    pub external_id: Option<String>,
    pub delivery_status: String,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<MessageEntity> for domain::models::Message {
    fn from(entity: MessageEntity) -> Self {
        Self {
            id: entity.id,
            message_id: entity.message_id,
            conversation_id: entity.conversation_id,
            direction: MessageDirection::parse(&entity.direction)
                .unwrap_or(MessageDirection::Inbound),
            body: entity.body,
            intent: entity.intent.as_deref().and_then(MessageIntent::parse),
            external_id: entity.external_id,
            delivery_status: DeliveryStatus::parse(&entity.delivery_status)
                .unwrap_or(DeliveryStatus::Received),
            error: entity.error,
            created_at: entity.created_at,
        }
    }
}
