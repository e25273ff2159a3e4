//! Campaign and recipient repository.
//!
//! Dispatch is driven from here: due campaigns are claimed with
//! `FOR UPDATE SKIP LOCKED`, and each recipient goes `pending → sending` before
//! the remote call and `sent` / `failed` after it, so a crash can never cause a
//! second delivery.

use chrono::{DateTime, Utc};
use domain::models::campaign::NormalizedRecipient;
use domain::models::CampaignStatus;
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::{CampaignEntity, RecipientEntity};
use crate::metrics::QueryTimer;

const CAMPAIGN_COLUMNS: &str = "id, user_id, agent_id, name, message_template, status, \
                                scheduled_at, started_at, completed_at, total_recipients, \
                                sent_count, failed_count, failure_reason, created_at, updated_at";

const RECIPIENT_COLUMNS: &str = "id, campaign_id, phone, name, status, error, sent_at";

/// Error recorded on recipients whose send was cut short by a restart.
pub const INTERRUPTED_ERROR: &str = "interrupted";

/// Outcome of putting `sending` campaigns back in the queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    pub recipients_failed: i64,
    pub campaigns_requeued: u64,
}

/// Repository for campaigns and their recipients.
#[derive(Clone)]
pub struct CampaignRepository {
    pool: PgPool,
}

impl CampaignRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a campaign with its recipients in `draft` or `scheduled` state.
    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        &self,
        user_id: Uuid,
        agent_id: Uuid,
        name: &str,
        message_template: &str,
        recipients: &[NormalizedRecipient],
        status: CampaignStatus,
        scheduled_at: Option<DateTime<Utc>>,
    ) -> Result<CampaignEntity, sqlx::Error> {
        let timer = QueryTimer::new("create_campaign");
        let mut tx = self.pool.begin().await?;

        let campaign = sqlx::query_as::<_, CampaignEntity>(&format!(
            r#"
            INSERT INTO campaigns (user_id, agent_id, name, message_template, status,
                                   scheduled_at, total_recipients)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {CAMPAIGN_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(agent_id)
        .bind(name)
        .bind(message_template)
        .bind(status.as_str())
        .bind(scheduled_at)
        .bind(recipients.len() as i32)
        .fetch_one(&mut *tx)
        .await?;

        let phones: Vec<String> = recipients.iter().map(|r| r.phone.clone()).collect();
        let names: Vec<Option<String>> = recipients.iter().map(|r| r.name.clone()).collect();

        sqlx::query(
            r#"
            INSERT INTO campaign_recipients (campaign_id, phone, name)
            SELECT $1, * FROM UNNEST($2::text[], $3::text[])
            "#,
        )
        .bind(campaign.id)
        .bind(&phones)
        .bind(&names)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        timer.record();
        Ok(campaign)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<CampaignEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_campaign_by_id");
        let result = sqlx::query_as::<_, CampaignEntity>(&format!(
            "SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn find_for_user(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<CampaignEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_campaign_for_user");
        let result = sqlx::query_as::<_, CampaignEntity>(&format!(
            "SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn list_for_user(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<CampaignEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_campaigns_for_user");
        let result = sqlx::query_as::<_, CampaignEntity>(&format!(
            r#"
            SELECT {CAMPAIGN_COLUMNS}
            FROM campaigns
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#
        ))
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Recipients in insertion order.
    pub async fn recipients(
        &self,
        campaign_id: Uuid,
        limit: i64,
    ) -> Result<Vec<RecipientEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_campaign_recipients");
        let result = sqlx::query_as::<_, RecipientEntity>(&format!(
            r#"
            SELECT {RECIPIENT_COLUMNS}
            FROM campaign_recipients
            WHERE campaign_id = $1
            ORDER BY id
            LIMIT $2
            "#
        ))
        .bind(campaign_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Moves a campaign to `to` if its current status is one of `from`.
    ///
    /// Returns `None` when the campaign does not exist for this user or is in
    /// another status. Leaving `sending` stamps `completed_at`; cancelling
    /// marks the untouched recipients `skipped`.
    pub async fn transition(
        &self,
        user_id: Uuid,
        id: Uuid,
        from: &[CampaignStatus],
        to: CampaignStatus,
        scheduled_at: Option<DateTime<Utc>>,
    ) -> Result<Option<CampaignEntity>, sqlx::Error> {
        let timer = QueryTimer::new("transition_campaign");
        let from: Vec<&str> = from.iter().map(|s| s.as_str()).collect();
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query_as::<_, CampaignEntity>(&format!(
            r#"
            UPDATE campaigns
            SET status = $3,
                scheduled_at = COALESCE($5, scheduled_at),
                completed_at = CASE WHEN $6 THEN NOW() ELSE completed_at END,
                updated_at = NOW()
            WHERE id = $1 AND user_id = $2 AND status = ANY($4)
            RETURNING {CAMPAIGN_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user_id)
        .bind(to.as_str())
        .bind(&from)
        .bind(scheduled_at)
        .bind(to.is_terminal())
        .fetch_optional(&mut *tx)
        .await?;

        if updated.is_some() && to == CampaignStatus::Cancelled {
            sqlx::query(
                r#"
                UPDATE campaign_recipients
                SET status = 'skipped'
                WHERE campaign_id = $1 AND status = 'pending'
                "#,
            )
            .bind(id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        timer.record();
        Ok(updated)
    }

    /// Claims up to `limit` scheduled campaigns due at `now`, moving them to
    /// `sending`. Rows locked by a concurrent claimer are skipped.
    pub async fn claim_due(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<CampaignEntity>, sqlx::Error> {
        let timer = QueryTimer::new("claim_due_campaigns");
        let result = sqlx::query_as::<_, CampaignEntity>(&format!(
            r#"
            UPDATE campaigns
            SET status = 'sending',
                started_at = COALESCE(started_at, NOW()),
                updated_at = NOW()
            WHERE id IN (
                SELECT id FROM campaigns
                WHERE status = 'scheduled' AND (scheduled_at IS NULL OR scheduled_at <= $1)
                ORDER BY scheduled_at NULLS FIRST, created_at
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            )
            RETURNING {CAMPAIGN_COLUMNS}
            "#
        ))
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn current_status(&self, id: Uuid) -> Result<Option<CampaignStatus>, sqlx::Error> {
        let status: Option<String> =
            sqlx::query_scalar("SELECT status FROM campaigns WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(status.as_deref().and_then(CampaignStatus::parse))
    }

    /// First pending recipient in insertion order.
    pub async fn next_pending(
        &self,
        campaign_id: Uuid,
    ) -> Result<Option<RecipientEntity>, sqlx::Error> {
        let timer = QueryTimer::new("next_pending_recipient");
        let result = sqlx::query_as::<_, RecipientEntity>(&format!(
            r#"
            SELECT {RECIPIENT_COLUMNS}
            FROM campaign_recipients
            WHERE campaign_id = $1 AND status = 'pending'
            ORDER BY id
            LIMIT 1
            "#
        ))
        .bind(campaign_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// `pending → sending`. Returns false if someone else got there first.
    pub async fn claim_recipient(&self, recipient_id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE campaign_recipients
            SET status = 'sending'
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(recipient_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// `sending → sent` and bump the campaign's sent counter.
    pub async fn mark_recipient_sent(&self, recipient_id: i64) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("mark_recipient_sent");
        sqlx::query(
            r#"
            WITH r AS (
                UPDATE campaign_recipients
                SET status = 'sent', sent_at = NOW(), error = NULL
                WHERE id = $1 AND status = 'sending'
                RETURNING campaign_id
            )
            UPDATE campaigns
            SET sent_count = sent_count + 1, updated_at = NOW()
            WHERE id IN (SELECT campaign_id FROM r)
            "#,
        )
        .bind(recipient_id)
        .execute(&self.pool)
        .await?;
        timer.record();
        Ok(())
    }

    /// `sending → failed` with the raw error and bump the failed counter.
    pub async fn mark_recipient_failed(
        &self,
        recipient_id: i64,
        error: &str,
    ) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("mark_recipient_failed");
        sqlx::query(
            r#"
            WITH r AS (
                UPDATE campaign_recipients
                SET status = 'failed', error = $2
                WHERE id = $1 AND status = 'sending'
                RETURNING campaign_id
            )
            UPDATE campaigns
            SET failed_count = failed_count + 1, updated_at = NOW()
            WHERE id IN (SELECT campaign_id FROM r)
            "#,
        )
        .bind(recipient_id)
        .bind(error)
        .execute(&self.pool)
        .await?;
        timer.record();
        Ok(())
    }

    /// Marks every remaining pending recipient `skipped`.
    pub async fn skip_pending(&self, campaign_id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE campaign_recipients
            SET status = 'skipped'
            WHERE campaign_id = $1 AND status = 'pending'
            "#,
        )
        .bind(campaign_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// `sending → completed`.
    pub async fn complete(&self, id: Uuid) -> Result<Option<CampaignEntity>, sqlx::Error> {
        self.finish(id, CampaignStatus::Completed, None).await
    }

    /// `sending → failed` with a reason.
    pub async fn fail(&self, id: Uuid, reason: &str) -> Result<Option<CampaignEntity>, sqlx::Error> {
        self.finish(id, CampaignStatus::Failed, Some(reason)).await
    }

    async fn finish(
        &self,
        id: Uuid,
        status: CampaignStatus,
        reason: Option<&str>,
    ) -> Result<Option<CampaignEntity>, sqlx::Error> {
        let timer = QueryTimer::new("finish_campaign");
        let result = sqlx::query_as::<_, CampaignEntity>(&format!(
            r#"
            UPDATE campaigns
            SET status = $2, failure_reason = $3, completed_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND status = 'sending'
            RETURNING {CAMPAIGN_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(status.as_str())
        .bind(reason)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Boot-time recovery after a crash or restart.
    ///
    /// Recipients left in `sending` may or may not have been delivered, so they
    /// become `failed` ("interrupted") and are never retried. Campaigns left in
    /// `sending` go back to `scheduled` so the untouched recipients are sent on
    /// the next poll.
    pub async fn recover_interrupted(&self) -> Result<RecoveryReport, sqlx::Error> {
        self.requeue_sending(None).await
    }

    /// Same recovery for a single campaign whose dispatch stopped on an error.
    pub async fn requeue(&self, id: Uuid) -> Result<RecoveryReport, sqlx::Error> {
        self.requeue_sending(Some(id)).await
    }

    async fn requeue_sending(&self, only: Option<Uuid>) -> Result<RecoveryReport, sqlx::Error> {
        let timer = QueryTimer::new("requeue_sending_campaigns");
        let mut tx = self.pool.begin().await?;

        let per_campaign: Vec<i64> = sqlx::query_scalar(
            r#"
            WITH r AS (
                UPDATE campaign_recipients
                SET status = 'failed', error = $1
                WHERE status = 'sending' AND ($2::uuid IS NULL OR campaign_id = $2)
                RETURNING campaign_id
            ),
            c AS (
                SELECT campaign_id, COUNT(*) AS n FROM r GROUP BY campaign_id
            )
            UPDATE campaigns
            SET failed_count = failed_count + c.n, updated_at = NOW()
            FROM c
            WHERE campaigns.id = c.campaign_id
            RETURNING c.n
            "#,
        )
        .bind(INTERRUPTED_ERROR)
        .bind(only)
        .fetch_all(&mut *tx)
        .await?;

        let requeued = sqlx::query(
            r#"
            UPDATE campaigns
            SET status = 'scheduled', updated_at = NOW()
            WHERE status = 'sending' AND ($1::uuid IS NULL OR id = $1)
            "#,
        )
        .bind(only)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        timer.record();

        Ok(RecoveryReport {
            recipients_failed: per_campaign.iter().sum(),
            campaigns_requeued: requeued.rows_affected(),
        })
    }
}
