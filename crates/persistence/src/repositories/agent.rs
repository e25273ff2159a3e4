//! Agent repository.

use domain::models::agent::{CreateAgentRequest, UpdateAgentRequest};
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::AgentEntity;
use crate::metrics::QueryTimer;

const AGENT_COLUMNS: &str = "id, user_id, name, phone_number, whatsapp_phone_number_id, \
                             system_prompt, language, fallback_reply, refusal_reply, auto_reply, \
                             active, created_at, updated_at";

/// Repository for AI agents.
#[derive(Clone)]
pub struct AgentRepository {
    pool: PgPool,
}

impl AgentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create an agent. `phone_number` must already be normalized.
    pub async fn create(
        &self,
        user_id: Uuid,
        phone_number: &str,
        request: &CreateAgentRequest,
    ) -> Result<AgentEntity, sqlx::Error> {
        let timer = QueryTimer::new("create_agent");
        let result = sqlx::query_as::<_, AgentEntity>(&format!(
            r#"
            INSERT INTO agents (user_id, name, phone_number, whatsapp_phone_number_id,
                                system_prompt, language, fallback_reply, refusal_reply, auto_reply)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {AGENT_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(&request.name)
        .bind(phone_number)
        .bind(&request.whatsapp_phone_number_id)
        .bind(&request.system_prompt)
        .bind(&request.language)
        .bind(&request.fallback_reply)
        .bind(&request.refusal_reply)
        .bind(request.auto_reply)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Find an agent by id regardless of tenant (webhook entry point).
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<AgentEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_agent_by_id");
        let result = sqlx::query_as::<_, AgentEntity>(&format!(
            "SELECT {AGENT_COLUMNS} FROM agents WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Find an agent owned by `user_id`.
    pub async fn find_for_user(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<AgentEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_agent_for_user");
        let result = sqlx::query_as::<_, AgentEntity>(&format!(
            "SELECT {AGENT_COLUMNS} FROM agents WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<AgentEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_agents_for_user");
        let result = sqlx::query_as::<_, AgentEntity>(&format!(
            "SELECT {AGENT_COLUMNS} FROM agents WHERE user_id = $1 ORDER BY created_at"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn count_for_user(&self, user_id: Uuid) -> Result<i64, sqlx::Error> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM agents WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }

    /// Partial update; absent fields keep their value.
    pub async fn update(
        &self,
        user_id: Uuid,
        id: Uuid,
        request: &UpdateAgentRequest,
    ) -> Result<Option<AgentEntity>, sqlx::Error> {
        let timer = QueryTimer::new("update_agent");
        let result = sqlx::query_as::<_, AgentEntity>(&format!(
            r#"
            UPDATE agents
            SET name = COALESCE($3, name),
                system_prompt = COALESCE($4, system_prompt),
                language = COALESCE($5, language),
                fallback_reply = COALESCE($6, fallback_reply),
                refusal_reply = COALESCE($7, refusal_reply),
                auto_reply = COALESCE($8, auto_reply),
                active = COALESCE($9, active),
                updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING {AGENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user_id)
        .bind(&request.name)
        .bind(&request.system_prompt)
        .bind(&request.language)
        .bind(&request.fallback_reply)
        .bind(&request.refusal_reply)
        .bind(request.auto_reply)
        .bind(request.active)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Delete an agent and, by cascade, its conversations and campaigns.
    pub async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("delete_agent");
        let result = sqlx::query("DELETE FROM agents WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        timer.record();
        Ok(result.rows_affected() > 0)
    }
}
