//! Lead repository.

use domain::models::LeadStatus;
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::LeadEntity;
use crate::metrics::QueryTimer;

const LEAD_COLUMNS: &str = "id, user_id, conversation_id, phone, name, email, status, score, \
                            source, notes, created_at, updated_at";

/// Repository for CRM leads (one per tenant and phone number).
#[derive(Clone)]
pub struct LeadRepository {
    pool: PgPool,
}

impl LeadRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_phone(
        &self,
        user_id: Uuid,
        phone: &str,
    ) -> Result<Option<LeadEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_lead_by_phone");
        let result = sqlx::query_as::<_, LeadEntity>(&format!(
            "SELECT {LEAD_COLUMNS} FROM leads WHERE user_id = $1 AND phone = $2"
        ))
        .bind(user_id)
        .bind(phone)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn find_for_user(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<LeadEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_lead_for_user");
        let result = sqlx::query_as::<_, LeadEntity>(&format!(
            "SELECT {LEAD_COLUMNS} FROM leads WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Creates the lead for a contact, or returns the existing one untouched
    /// when another message created it first.
    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        &self,
        user_id: Uuid,
        conversation_id: Option<Uuid>,
        phone: &str,
        name: Option<&str>,
        email: Option<&str>,
        status: LeadStatus,
        score: i32,
        source: &str,
    ) -> Result<LeadEntity, sqlx::Error> {
        let timer = QueryTimer::new("create_lead");
        let result = sqlx::query_as::<_, LeadEntity>(&format!(
            r#"
            INSERT INTO leads (user_id, conversation_id, phone, name, email, status, score, source)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (user_id, phone) DO UPDATE SET updated_at = leads.updated_at
            RETURNING {LEAD_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(conversation_id)
        .bind(phone)
        .bind(name)
        .bind(email)
        .bind(status.as_str())
        .bind(score)
        .bind(source)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Records conversation activity on a lead. Name and email only fill
    /// blanks; the dashboard owns them once set.
    pub async fn record_activity(
        &self,
        id: Uuid,
        status: LeadStatus,
        score: i32,
        name: Option<&str>,
        email: Option<&str>,
    ) -> Result<LeadEntity, sqlx::Error> {
        let timer = QueryTimer::new("record_lead_activity");
        let result = sqlx::query_as::<_, LeadEntity>(&format!(
            r#"
            UPDATE leads
            SET status = $2,
                score = $3,
                name = COALESCE(name, $4),
                email = COALESCE(email, $5),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {LEAD_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(status.as_str())
        .bind(score)
        .bind(name)
        .bind(email)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Moves the lead of `phone` to `status` unless it is already converted.
    pub async fn promote_by_phone(
        &self,
        user_id: Uuid,
        phone: &str,
        status: LeadStatus,
    ) -> Result<Option<LeadEntity>, sqlx::Error> {
        let timer = QueryTimer::new("promote_lead_by_phone");
        let result = sqlx::query_as::<_, LeadEntity>(&format!(
            r#"
            UPDATE leads
            SET status = $3, updated_at = NOW()
            WHERE user_id = $1 AND phone = $2 AND status <> 'converted'
            RETURNING {LEAD_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(phone)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Most recently updated first.
    pub async fn list_for_user(
        &self,
        user_id: Uuid,
        status: Option<LeadStatus>,
        limit: i64,
    ) -> Result<Vec<LeadEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_leads_for_user");
        let result = sqlx::query_as::<_, LeadEntity>(&format!(
            r#"
            SELECT {LEAD_COLUMNS}
            FROM leads
            WHERE user_id = $1 AND ($2::text IS NULL OR status = $2)
            ORDER BY updated_at DESC
            LIMIT $3
            "#
        ))
        .bind(user_id)
        .bind(status.map(|s| s.as_str()))
        .bind(limit)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Dashboard edit. Absent fields keep their value.
    pub async fn update(
        &self,
        user_id: Uuid,
        id: Uuid,
        status: Option<LeadStatus>,
        name: Option<&str>,
        email: Option<&str>,
        notes: Option<&str>,
    ) -> Result<Option<LeadEntity>, sqlx::Error> {
        let timer = QueryTimer::new("update_lead");
        let result = sqlx::query_as::<_, LeadEntity>(&format!(
            r#"
            UPDATE leads
            SET status = COALESCE($3, status),
                name = COALESCE($4, name),
                email = COALESCE($5, email),
                notes = COALESCE($6, notes),
                updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING {LEAD_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user_id)
        .bind(status.map(|s| s.as_str()))
        .bind(name)
        .bind(email)
        .bind(notes)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }
}
