//! Bulk campaign dispatch.
//!
//! Campaigns are claimed atomically by the scheduler tick, then recipients are
//! sent one at a time with a random pause between sends. Every recipient goes
//! `pending → sending → sent | failed` so a crash never causes a resend.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use domain::models::campaign::FAILURE_INSUFFICIENT_CREDITS;
use domain::models::{Agent, CampaignStatus};
use domain::services::{render, MessagingGateway, TemplateVars};
use persistence::entities::CampaignEntity;
use persistence::repositories::{AgentRepository, CampaignRepository, RecoveryReport, UserRepository};
use rand::Rng;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::config::CampaignConfig;
use crate::middleware::metrics::record_campaign_message;
use crate::services::events::{EventHub, TenantEvent};

/// Failure reason when the campaign's agent was deleted or deactivated.
pub const FAILURE_AGENT_UNAVAILABLE: &str = "agent_unavailable";

#[derive(Debug, Error)]
pub enum CampaignError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// How one dispatch run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchEnd {
    Completed,
    /// Status changed under us (cancelled by the tenant).
    Stopped(CampaignStatus),
    Failed(&'static str),
}

#[derive(Clone)]
pub struct CampaignSender {
    campaigns: CampaignRepository,
    agents: AgentRepository,
    users: UserRepository,
    gateway: Arc<dyn MessagingGateway>,
    events: EventHub,
    settings: CampaignConfig,
}

impl CampaignSender {
    pub fn new(
        pool: PgPool,
        gateway: Arc<dyn MessagingGateway>,
        events: EventHub,
        settings: CampaignConfig,
    ) -> Self {
        Self {
            campaigns: CampaignRepository::new(pool.clone()),
            agents: AgentRepository::new(pool.clone()),
            users: UserRepository::new(pool),
            gateway,
            events,
            settings,
        }
    }

    /// Claims due campaigns and dispatches them in turn. Returns how many were
    /// claimed.
    pub async fn run_due(&self, limit: i64) -> Result<usize, CampaignError> {
        let claimed = self.campaigns.claim_due(Utc::now(), limit).await?;
        let count = claimed.len();
        if count > 0 {
            tracing::info!(count, "Claimed due campaigns");
        }

        for campaign in claimed {
            let campaign_id = campaign.id;
            match self.dispatch(campaign).await {
                Ok(end) => {
                    tracing::info!(campaign_id = %campaign_id, end = ?end, "Campaign dispatch finished")
                }
                Err(e) => {
                    tracing::error!(campaign_id = %campaign_id, error = %e, "Campaign dispatch aborted");
                    self.requeue(campaign_id).await;
                }
            }
        }
        Ok(count)
    }

    /// Sends a claimed (`sending`) campaign to its pending recipients.
    #[tracing::instrument(skip(self, campaign), fields(campaign_id = %campaign.id))]
    pub async fn dispatch(&self, campaign: CampaignEntity) -> Result<DispatchEnd, CampaignError> {
        let agent = self
            .agents
            .find_by_id(campaign.agent_id)
            .await?
            .filter(|a| a.active)
            .map(Agent::from);
        let Some(agent) = agent else {
            return self.abort(&campaign, FAILURE_AGENT_UNAVAILABLE).await;
        };

        let cost = self.settings.message_cost;
        let mut first = true;

        loop {
            if !first {
                tokio::time::sleep(pick_delay(self.settings.min_delay_ms, self.settings.max_delay_ms))
                    .await;
            }
            first = false;

            match self.campaigns.current_status(campaign.id).await? {
                Some(CampaignStatus::Sending) => {}
                Some(other) => return Ok(DispatchEnd::Stopped(other)),
                None => return Ok(DispatchEnd::Stopped(CampaignStatus::Cancelled)),
            }

            let Some(recipient) = self.campaigns.next_pending(campaign.id).await? else {
                if let Some(done) = self.campaigns.complete(campaign.id).await? {
                    self.publish_progress(&done);
                }
                return Ok(DispatchEnd::Completed);
            };

            if self.users.debit_credits(campaign.user_id, cost).await?.is_none() {
                tracing::warn!(user_id = %campaign.user_id, "Campaign stopped, no credits left");
                return self.abort(&campaign, FAILURE_INSUFFICIENT_CREDITS).await;
            }

            match self.campaigns.claim_recipient(recipient.id).await {
                Ok(true) => {}
                Ok(false) => {
                    self.users.refund_credits(campaign.user_id, cost).await?;
                    continue;
                }
                Err(e) => {
                    self.refund(campaign.user_id, cost).await;
                    return Err(e.into());
                }
            }

            let body = render(
                &campaign.message_template,
                TemplateVars {
                    name: recipient.name.as_deref(),
                    phone: &recipient.phone,
                },
            );

            match self
                .gateway
                .send_text(&agent.whatsapp_phone_number_id, &recipient.phone, &body)
                .await
            {
                Ok(_) => {
                    self.campaigns.mark_recipient_sent(recipient.id).await?;
                    record_campaign_message("sent");
                }
                Err(e) => {
                    tracing::warn!(recipient_id = recipient.id, error = %e, "Campaign message failed");
                    self.users.refund_credits(campaign.user_id, cost).await?;
                    self.campaigns
                        .mark_recipient_failed(recipient.id, &e.to_string())
                        .await?;
                    record_campaign_message("failed");
                }
            }

            if let Some(current) = self.campaigns.find_by_id(campaign.id).await? {
                self.publish_progress(&current);
            }
        }
    }

    /// Boot-time cleanup of campaigns a previous process left in `sending`.
    pub async fn recover_interrupted(&self) -> Result<RecoveryReport, CampaignError> {
        let report = self.campaigns.recover_interrupted().await?;
        if report.recipients_failed > 0 || report.campaigns_requeued > 0 {
            tracing::warn!(
                recipients_failed = report.recipients_failed,
                campaigns_requeued = report.campaigns_requeued,
                "Recovered interrupted campaigns"
            );
        }
        Ok(report)
    }

    /// Puts a campaign whose dispatch hit an error back to `scheduled`. Its
    /// in-flight recipient is failed as interrupted; the rest go out on the
    /// next poll.
    async fn requeue(&self, campaign_id: Uuid) {
        match self.campaigns.requeue(campaign_id).await {
            Ok(report) => tracing::warn!(
                campaign_id = %campaign_id,
                recipients_failed = report.recipients_failed,
                requeued = report.campaigns_requeued,
                "Campaign requeued after dispatch error"
            ),
            Err(e) => tracing::error!(
                campaign_id = %campaign_id,
                error = %e,
                "Failed to requeue campaign, it stays in sending until restart"
            ),
        }
    }

    async fn refund(&self, user_id: Uuid, cost: i32) {
        if let Err(e) = self.users.refund_credits(user_id, cost).await {
            tracing::error!(user_id = %user_id, error = %e, "Failed to refund campaign credits");
        }
    }

    async fn abort(
        &self,
        campaign: &CampaignEntity,
        reason: &'static str,
    ) -> Result<DispatchEnd, CampaignError> {
        let skipped = self.campaigns.skip_pending(campaign.id).await?;
        tracing::warn!(campaign_id = %campaign.id, reason, skipped, "Campaign failed");
        if let Some(failed) = self.campaigns.fail(campaign.id, reason).await? {
            self.publish_progress(&failed);
        }
        Ok(DispatchEnd::Failed(reason))
    }

    fn publish_progress(&self, campaign: &CampaignEntity) {
        self.events.publish(
            campaign.user_id,
            TenantEvent::CampaignProgress {
                campaign_id: campaign.id,
                status: campaign.status(),
                sent_count: campaign.sent_count,
                failed_count: campaign.failed_count,
                total_recipients: campaign.total_recipients,
            },
        );
    }
}

/// Uniform pause in `[min_ms, max_ms]`.
fn pick_delay(min_ms: u64, max_ms: u64) -> Duration {
    if max_ms <= min_ms {
        return Duration::from_millis(min_ms);
    }
    Duration::from_millis(rand::thread_rng().gen_range(min_ms..=max_ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pick_delay_within_bounds() {
        for _ in 0..100 {
            let d = pick_delay(1000, 3000).as_millis();
            assert!((1000..=3000).contains(&d));
        }
    }

    #[test]
    fn test_pick_delay_degenerate_bounds() {
        assert_eq!(pick_delay(500, 500), Duration::from_millis(500));
        assert_eq!(pick_delay(0, 0), Duration::ZERO);
        assert_eq!(pick_delay(800, 100), Duration::from_millis(800));
    }
}
