//! Bulk WhatsApp campaign model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Maximum recipients accepted in one campaign.
pub const MAX_RECIPIENTS: usize = 5000;

/// Reason recorded when a campaign runs out of credits.
pub const FAILURE_INSUFFICIENT_CREDITS: &str = "insufficient_credits";

/// Campaign lifecycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    Draft,
    Scheduled,
    Sending,
    Completed,
    Cancelled,
    Failed,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Draft => "draft",
            CampaignStatus::Scheduled => "scheduled",
            CampaignStatus::Sending => "sending",
            CampaignStatus::Completed => "completed",
            CampaignStatus::Cancelled => "cancelled",
            CampaignStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(CampaignStatus::Draft),
            "scheduled" => Some(CampaignStatus::Scheduled),
            "sending" => Some(CampaignStatus::Sending),
            "completed" => Some(CampaignStatus::Completed),
            "cancelled" => Some(CampaignStatus::Cancelled),
            "failed" => Some(CampaignStatus::Failed),
            _ => None,
        }
    }

    /// `sending → scheduled` only happens during crash recovery.
    pub fn can_transition_to(&self, next: CampaignStatus) -> bool {
        use CampaignStatus::*;
        matches!(
            (self, next),
            (Draft, Scheduled)
                | (Draft, Cancelled)
                | (Scheduled, Sending)
                | (Scheduled, Cancelled)
                | (Scheduled, Draft)
                | (Sending, Completed)
                | (Sending, Failed)
                | (Sending, Cancelled)
                | (Sending, Scheduled)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CampaignStatus::Completed | CampaignStatus::Cancelled | CampaignStatus::Failed
        )
    }
}

impl std::fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery state of one campaign recipient.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RecipientStatus {
    Pending,
    /// Claimed by a sender; the remote call may or may not have happened.
    Sending,
    Sent,
    Failed,
    Skipped,
}

impl RecipientStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecipientStatus::Pending => "pending",
            RecipientStatus::Sending => "sending",
            RecipientStatus::Sent => "sent",
            RecipientStatus::Failed => "failed",
            RecipientStatus::Skipped => "skipped",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(RecipientStatus::Pending),
            "sending" => Some(RecipientStatus::Sending),
            "sent" => Some(RecipientStatus::Sent),
            "failed" => Some(RecipientStatus::Failed),
            "skipped" => Some(RecipientStatus::Skipped),
            _ => None,
        }
    }
}

/// A bulk message job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub campaign_id: Uuid,
    pub user_id: Uuid,
    pub agent_id: Uuid,
    pub name: String,
    pub message_template: String,
    pub status: CampaignStatus,
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

impl Campaign {
    /// Percentage of recipients processed, 0..=100.
    pub fn progress_percent(&self) -> u8 {
        if self.total_recipients <= 0 {
            return 100;
        }
        let done = i64::from(self.sent_count + self.failed_count);
        let pct = done * 100 / i64::from(self.total_recipients);
        pct.clamp(0, 100) as u8
    }
}

/// One recipient of a campaign.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    pub id: i64,
    pub campaign_id: Uuid,
    pub phone: String,
    pub name: Option<String>,
    pub status: RecipientStatus,
    pub error: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
}

/// Recipient entry in a create request.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RecipientInput {
    pub phone: String,

    #[validate(length(max = 200, message = "Name cannot exceed 200 characters"))]
    pub name: Option<String>,
}

/// Request payload for creating a campaign (created as draft).
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCampaignRequest {
    pub agent_id: Uuid,

    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: String,

    pub message_template: String,

    #[validate(nested)]
    pub recipients: Vec<RecipientInput>,

    /// When set, the campaign is scheduled right away.
    pub scheduled_at: Option<DateTime<Utc>>,
}

/// Request payload for scheduling a draft campaign.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleCampaignRequest {
    /// Defaults to now.
    pub scheduled_at: Option<DateTime<Utc>>,
}

/// Campaign with its recipient breakdown.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignDetail {
    #[serde(flatten)]
    pub campaign: Campaign,
    pub progress_percent: u8,
    pub recipients: Vec<Recipient>,
}

/// A validated recipient list: normalized, de-duplicated numbers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedRecipient {
    pub phone: String,
    pub name: Option<String>,
}

/// Normalizes phone numbers and drops duplicates, keeping the first occurrence.
///
/// Returns the offending raw number on the first invalid entry.
pub fn normalize_recipients(
    inputs: &[RecipientInput],
) -> Result<Vec<NormalizedRecipient>, String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::with_capacity(inputs.len());

    for input in inputs {
        let phone = shared::validation::normalize_phone(&input.phone)
            .map_err(|_| input.phone.clone())?;
        if seen.insert(phone.clone()) {
            out.push(NormalizedRecipient {
                phone,
                name: input
                    .name
                    .as_ref()
                    .map(|n| n.trim().to_string())
                    .filter(|n| !n.is_empty()),
            });
        }
    }

    Ok(out)
}
