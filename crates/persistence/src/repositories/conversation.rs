//! Conversation and message repositories.

use chrono::{DateTime, Utc};
use domain::models::{DeliveryStatus, MessageDirection};
use domain::services::MessageIntent;
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::{ConversationEntity, MessageEntity};
use crate::metrics::QueryTimer;

const CONVERSATION_COLUMNS: &str =
    "id, agent_id, user_id, contact_phone, contact_name, ai_paused, last_message_at, created_at";

const MESSAGE_COLUMNS: &str = "id, message_id, conversation_id, direction, body, intent, \
                               external_id, delivery_status, error, created_at";

/// How long a claimed inbound message stays reserved for the worker that
/// claimed it.
pub const INBOUND_CLAIM_TTL_SECS: i64 = 300;

/// Repository for conversations (one per agent and contact).
#[derive(Clone)]
pub struct ConversationRepository {
    pool: PgPool,
}

impl ConversationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns the conversation for (`agent_id`, `contact_phone`), creating it
    /// if needed, and bumps `last_message_at`. A known contact name is kept
    /// when the new one is missing.
    pub async fn upsert(
        &self,
        agent_id: Uuid,
        user_id: Uuid,
        contact_phone: &str,
        contact_name: Option<&str>,
    ) -> Result<ConversationEntity, sqlx::Error> {
        let timer = QueryTimer::new("upsert_conversation");
        let result = sqlx::query_as::<_, ConversationEntity>(&format!(
            r#"
            INSERT INTO conversations (agent_id, user_id, contact_phone, contact_name)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (agent_id, contact_phone) DO UPDATE
            SET contact_name = COALESCE(EXCLUDED.contact_name, conversations.contact_name),
                last_message_at = NOW()
            RETURNING {CONVERSATION_COLUMNS}
            "#
        ))
        .bind(agent_id)
        .bind(user_id)
        .bind(contact_phone)
        .bind(contact_name)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn find_for_user(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<ConversationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_conversation_for_user");
        let result = sqlx::query_as::<_, ConversationEntity>(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Most recently active conversations first.
    pub async fn list_for_user(
        &self,
        user_id: Uuid,
        agent_id: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<ConversationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_conversations_for_user");
        let result = sqlx::query_as::<_, ConversationEntity>(&format!(
            r#"
            SELECT {CONVERSATION_COLUMNS}
            FROM conversations
            WHERE user_id = $1 AND ($2::uuid IS NULL OR agent_id = $2)
            ORDER BY last_message_at DESC
            LIMIT $3
            "#
        ))
        .bind(user_id)
        .bind(agent_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Pauses or resumes automatic replies for a conversation.
    pub async fn set_ai_paused(
        &self,
        user_id: Uuid,
        id: Uuid,
        paused: bool,
    ) -> Result<Option<ConversationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("set_conversation_ai_paused");
        let result = sqlx::query_as::<_, ConversationEntity>(&format!(
            r#"
            UPDATE conversations
            SET ai_paused = $3
            WHERE id = $1 AND user_id = $2
            RETURNING {CONVERSATION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user_id)
        .bind(paused)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn touch(&self, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE conversations SET last_message_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// Repository for conversation messages.
#[derive(Clone)]
pub struct MessageRepository {
    pool: PgPool,
}

impl MessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Stores an inbound message and claims it for processing.
    ///
    /// A redelivery of a message that was never marked processed reclaims the
    /// stored row, unless another worker claimed it less than
    /// [`INBOUND_CLAIM_TTL_SECS`] ago. Returns `None` for a message that was
    /// already processed or is being processed.
    pub async fn claim_inbound(
        &self,
        conversation_id: Uuid,
        body: &str,
        intent: MessageIntent,
        external_id: &str,
    ) -> Result<Option<MessageEntity>, sqlx::Error> {
        let timer = QueryTimer::new("claim_inbound_message");
        let result = sqlx::query_as::<_, MessageEntity>(&format!(
            r#"
            INSERT INTO messages
                (conversation_id, direction, body, intent, external_id, delivery_status, claimed_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW())
            ON CONFLICT (conversation_id, external_id) DO UPDATE
                SET claimed_at = NOW()
                WHERE messages.processed_at IS NULL
                  AND (messages.claimed_at IS NULL
                       OR messages.claimed_at < NOW() - make_interval(secs => $7))
            RETURNING {MESSAGE_COLUMNS}
            "#
        ))
        .bind(conversation_id)
        .bind(MessageDirection::Inbound.as_str())
        .bind(body)
        .bind(intent.as_str())
        .bind(external_id)
        .bind(DeliveryStatus::Received.as_str())
        .bind(INBOUND_CLAIM_TTL_SECS as f64)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Marks a claimed inbound message as fully handled.
    pub async fn finish_inbound(&self, id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE messages SET processed_at = NOW(), claimed_at = NULL WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Drops the claim on a message whose processing failed, so the next
    /// redelivery retries it straight away.
    pub async fn release_inbound(&self, id: i64) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE messages SET claimed_at = NULL WHERE id = $1 AND processed_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Stores a message sent (or attempted) to the contact.
    pub async fn insert_outbound(
        &self,
        conversation_id: Uuid,
        body: &str,
        external_id: Option<&str>,
        status: DeliveryStatus,
        error: Option<&str>,
    ) -> Result<MessageEntity, sqlx::Error> {
        let timer = QueryTimer::new("insert_outbound_message");
        let result = sqlx::query_as::<_, MessageEntity>(&format!(
            r#"
            INSERT INTO messages (conversation_id, direction, body, external_id, delivery_status, error)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {MESSAGE_COLUMNS}
            "#
        ))
        .bind(conversation_id)
        .bind(MessageDirection::Outbound.as_str())
        .bind(body)
        .bind(external_id)
        .bind(status.as_str())
        .bind(error)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    /// The `limit` latest messages before `before_id`, oldest first.
    pub async fn recent(
        &self,
        conversation_id: Uuid,
        before_id: i64,
        limit: i64,
    ) -> Result<Vec<MessageEntity>, sqlx::Error> {
        let timer = QueryTimer::new("recent_messages");
        let result = sqlx::query_as::<_, MessageEntity>(&format!(
            r#"
            SELECT * FROM (
                SELECT {MESSAGE_COLUMNS}
                FROM messages
                WHERE conversation_id = $1 AND id < $2
                ORDER BY id DESC
                LIMIT $3
            ) latest
            ORDER BY id ASC
            "#
        ))
        .bind(conversation_id)
        .bind(before_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// One page of history, newest first, strictly older than `cursor`.
    ///
    /// Fetches `limit + 1` rows so the caller can tell whether more exist.
    pub async fn page(
        &self,
        conversation_id: Uuid,
        cursor: Option<(DateTime<Utc>, i64)>,
        limit: i64,
    ) -> Result<Vec<MessageEntity>, sqlx::Error> {
        let timer = QueryTimer::new("page_messages");
        let (before_ts, before_id) = match cursor {
            Some((ts, id)) => (Some(ts), Some(id)),
            None => (None, None),
        };
        let result = sqlx::query_as::<_, MessageEntity>(&format!(
            r#"
            SELECT {MESSAGE_COLUMNS}
            FROM messages
            WHERE conversation_id = $1
              AND ($2::timestamptz IS NULL OR (created_at, id) < ($2, $3))
            ORDER BY created_at DESC, id DESC
            LIMIT $4
            "#
        ))
        .bind(conversation_id)
        .bind(before_ts)
        .bind(before_id)
        .bind(limit + 1)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }
}
