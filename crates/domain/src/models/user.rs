//! Tenant account model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A tenant: the business owning agents, catalog and campaigns.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub plan_code: String,
    pub credits: i32,
    pub plan_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Paid plans carry an expiry; free plans never expire.
    pub fn is_plan_expired(&self, now: DateTime<Utc>) -> bool {
        self.plan_expires_at.is_some_and(|expires| expires <= now)
    }

    pub fn has_credits(&self, cost: i32) -> bool {
        self.credits >= cost
    }
}
