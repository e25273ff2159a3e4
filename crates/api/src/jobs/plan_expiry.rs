//! Subscription expiry background job.
//!
//! Tenants whose paid plan ran out go back to the free plan, keeping at most
//! the free plan's monthly credits.

use chrono::Utc;
use domain::models::plan::FREE_PLAN_CODE;
use persistence::repositories::{PlanRepository, UserRepository};
use sqlx::PgPool;
use tracing::info;

use super::scheduler::{Job, JobFrequency};

pub struct PlanExpiryJob {
    users: UserRepository,
    plans: PlanRepository,
}

impl PlanExpiryJob {
    pub fn new(pool: PgPool) -> Self {
        Self {
            users: UserRepository::new(pool.clone()),
            plans: PlanRepository::new(pool),
        }
    }
}

#[async_trait::async_trait]
impl Job for PlanExpiryJob {
    fn name(&self) -> &'static str {
        "plan_expiry"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Hourly
    }

    async fn execute(&self) -> Result<(), String> {
        let free = self
            .plans
            .find_by_code(FREE_PLAN_CODE)
            .await
            .map_err(|e| format!("Failed to load free plan: {}", e))?
            .ok_or_else(|| "Free plan is not configured".to_string())?;

        let downgraded = self
            .users
            .downgrade_expired(Utc::now(), &free.code, free.monthly_credits)
            .await
            .map_err(|e| format!("Failed to downgrade expired plans: {}", e))?;

        if !downgraded.is_empty() {
            info!(count = downgraded.len(), "Downgraded expired plans");
        }
        Ok(())
    }
}
