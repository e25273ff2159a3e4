//! Dashboard statistics.

use serde::Serialize;

/// Tenant-wide counters for the dashboard home page.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub agents: i64,
    pub conversations: i64,
    pub messages_received: i64,
    pub messages_sent: i64,
    pub leads: i64,
    pub leads_converted: i64,
    pub orders_pending: i64,
    pub orders_validated: i64,
    /// Sum of validated and delivered orders, in minor units.
    pub revenue_cents: i64,
    pub campaigns_active: i64,
    pub campaign_messages_sent: i64,
    pub credits: i32,
}

impl DashboardStats {
    /// Converted leads over all leads, as a percentage rounded down.
    pub fn conversion_rate_percent(&self) -> i64 {
        if self.leads == 0 {
            0
        } else {
            self.leads_converted * 100 / self.leads
        }
    }
}
