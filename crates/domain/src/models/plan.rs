//! Subscription plan model.

use serde::{Deserialize, Serialize};

/// Code of the plan every account starts on and falls back to on expiry.
pub const FREE_PLAN_CODE: &str = "free";

/// A billing tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionPlan {
    pub code: String,
    pub name: String,
    /// Credits granted when the plan starts or renews.
    pub monthly_credits: i32,
    /// Maximum number of agents (WhatsApp numbers) the tenant may connect.
    pub max_agents: i32,
    pub price_cents: i64,
    pub currency: String,
}

impl SubscriptionPlan {
    /// Whether a tenant that already owns `current_agents` may add one more.
    pub fn allows_another_agent(&self, current_agents: i64) -> bool {
        current_agents < i64::from(self.max_agents)
    }

    pub fn is_free(&self) -> bool {
        self.code == FREE_PLAN_CODE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(max_agents: i32) -> SubscriptionPlan {
        SubscriptionPlan {
            code: "starter".to_string(),
            name: "Starter".to_string(),
            monthly_credits: 1000,
            max_agents,
            price_cents: 1500,
            currency: "EUR".to_string(),
        }
    }

    #[test]
    fn test_allows_another_agent() {
        assert!(plan(2).allows_another_agent(0));
        assert!(plan(2).allows_another_agent(1));
        assert!(!plan(2).allows_another_agent(2));
        assert!(!plan(0).allows_another_agent(0));
    }

    #[test]
    fn test_is_free() {
        let mut p = plan(1);
        assert!(!p.is_free());
        p.code = FREE_PLAN_CODE.to_string();
        assert!(p.is_free());
    }
}
