//! Dashboard statistics repository.

use domain::models::DashboardStats;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::metrics::QueryTimer;

#[derive(Debug, FromRow)]
struct StatsRow {
    agents: i64,
    conversations: i64,
    messages_received: i64,
    messages_sent: i64,
    leads: i64,
    leads_converted: i64,
    orders_pending: i64,
    orders_validated: i64,
    revenue_cents: i64,
    campaigns_active: i64,
    campaign_messages_sent: i64,
    credits: i32,
}

/// Repository computing tenant-wide counters.
#[derive(Clone)]
pub struct StatsRepository {
    pool: PgPool,
}

impl StatsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns `None` when the user does not exist.
    pub async fn dashboard(&self, user_id: Uuid) -> Result<Option<DashboardStats>, sqlx::Error> {
        let timer = QueryTimer::new("dashboard_stats");
        let row = sqlx::query_as::<_, StatsRow>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM agents WHERE user_id = u.id) AS agents,
                (SELECT COUNT(*) FROM conversations WHERE user_id = u.id) AS conversations,
                (SELECT COUNT(*) FROM messages m JOIN conversations c ON c.id = m.conversation_id
                  WHERE c.user_id = u.id AND m.direction = 'inbound') AS messages_received,
                (SELECT COUNT(*) FROM messages m JOIN conversations c ON c.id = m.conversation_id
                  WHERE c.user_id = u.id AND m.direction = 'outbound'
                    AND m.delivery_status = 'sent') AS messages_sent,
                (SELECT COUNT(*) FROM leads WHERE user_id = u.id) AS leads,
                (SELECT COUNT(*) FROM leads WHERE user_id = u.id AND status = 'converted')
                    AS leads_converted,
                (SELECT COUNT(*) FROM orders WHERE user_id = u.id AND status = 'pending')
                    AS orders_pending,
                (SELECT COUNT(*) FROM orders WHERE user_id = u.id AND status = 'validated')
                    AS orders_validated,
                (SELECT COALESCE(SUM(total_cents), 0)::BIGINT FROM orders
                  WHERE user_id = u.id AND status IN ('validated', 'delivered')) AS revenue_cents,
                (SELECT COUNT(*) FROM campaigns
                  WHERE user_id = u.id AND status IN ('scheduled', 'sending')) AS campaigns_active,
                (SELECT COALESCE(SUM(sent_count), 0)::BIGINT FROM campaigns WHERE user_id = u.id)
                    AS campaign_messages_sent,
                u.credits
            FROM users u
            WHERE u.id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        timer.record();

        Ok(row.map(|r| DashboardStats {
            agents: r.agents,
            conversations: r.conversations,
            messages_received: r.messages_received,
            messages_sent: r.messages_sent,
            leads: r.leads,
            leads_converted: r.leads_converted,
            orders_pending: r.orders_pending,
            orders_validated: r.orders_validated,
            revenue_cents: r.revenue_cents,
            campaigns_active: r.campaigns_active,
            campaign_messages_sent: r.campaign_messages_sent,
            credits: r.credits,
        }))
    }
}
