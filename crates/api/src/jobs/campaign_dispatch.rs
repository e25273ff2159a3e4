//! Campaign dispatch background job.

use super::scheduler::{Job, JobFrequency};
use crate::services::CampaignSender;

/// Claims due campaigns every poll interval and sends them.
pub struct CampaignDispatchJob {
    sender: CampaignSender,
    poll_interval_secs: u64,
    batch_size: i64,
}

impl CampaignDispatchJob {
    pub fn new(sender: CampaignSender, poll_interval_secs: u64, batch_size: i64) -> Self {
        Self {
            sender,
            poll_interval_secs,
            batch_size: batch_size.max(1),
        }
    }
}

#[async_trait::async_trait]
impl Job for CampaignDispatchJob {
    fn name(&self) -> &'static str {
        "campaign_dispatch"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Seconds(self.poll_interval_secs)
    }

    fn run_on_start(&self) -> bool {
        true
    }

    async fn execute(&self) -> Result<(), String> {
        self.sender
            .run_due(self.batch_size)
            .await
            .map(|_| ())
            .map_err(|e| format!("Failed to dispatch campaigns: {}", e))
    }
}
