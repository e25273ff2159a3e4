//! User and subscription plan repositories.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::{PlanEntity, UserEntity};
use crate::metrics::QueryTimer;

const USER_COLUMNS: &str = "id, email, password_hash, display_name, plan_code, credits, \
                            plan_expires_at, created_at, updated_at";

/// Repository for tenant accounts and their credit balance.
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Creates a new UserRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find a user by ID.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<UserEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_user_by_id");
        let result = sqlx::query_as::<_, UserEntity>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Find a user by email address (case-insensitive).
    pub async fn find_by_email(&self, email: &str) -> Result<Option<UserEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_user_by_email");
        let result = sqlx::query_as::<_, UserEntity>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE LOWER(email) = LOWER($1)"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Create a tenant on `plan_code` with the plan's starting credits.
    pub async fn create(
        &self,
        email: &str,
        password_hash: &str,
        display_name: &str,
        plan_code: &str,
        credits: i32,
    ) -> Result<UserEntity, sqlx::Error> {
        let timer = QueryTimer::new("create_user");
        let result = sqlx::query_as::<_, UserEntity>(&format!(
            r#"
            INSERT INTO users (email, password_hash, display_name, plan_code, credits)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(email)
        .bind(password_hash)
        .bind(display_name)
        .bind(plan_code)
        .bind(credits)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Takes `cost` credits if the balance covers them.
    ///
    /// Returns the remaining balance, or `None` when the balance was too low
    /// (nothing is debited in that case).
    pub async fn debit_credits(&self, user_id: Uuid, cost: i32) -> Result<Option<i32>, sqlx::Error> {
        let timer = QueryTimer::new("debit_user_credits");
        let result = sqlx::query_scalar::<_, i32>(
            r#"
            UPDATE users
            SET credits = credits - $2, updated_at = NOW()
            WHERE id = $1 AND credits >= $2
            RETURNING credits
            "#,
        )
        .bind(user_id)
        .bind(cost)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Gives back credits taken by [`Self::debit_credits`].
    pub async fn refund_credits(&self, user_id: Uuid, amount: i32) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("refund_user_credits");
        sqlx::query(
            r#"
            UPDATE users
            SET credits = credits + $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(amount)
        .execute(&self.pool)
        .await?;
        timer.record();
        Ok(())
    }

    /// Moves every user whose paid plan expired at or before `now` to
    /// `fallback_plan`, capping their credits at `credit_cap`.
    ///
    /// Returns the ids of the downgraded users.
    pub async fn downgrade_expired(
        &self,
        now: DateTime<Utc>,
        fallback_plan: &str,
        credit_cap: i32,
    ) -> Result<Vec<Uuid>, sqlx::Error> {
        let timer = QueryTimer::new("downgrade_expired_plans");
        let result = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE users
            SET plan_code = $2,
                credits = LEAST(credits, $3),
                plan_expires_at = NULL,
                updated_at = NOW()
            WHERE plan_expires_at IS NOT NULL AND plan_expires_at <= $1
            RETURNING id
            "#,
        )
        .bind(now)
        .bind(fallback_plan)
        .bind(credit_cap)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }
}

/// Repository for the subscription plan catalog.
#[derive(Clone)]
pub struct PlanRepository {
    pool: PgPool,
}

impl PlanRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// All plans, cheapest first.
    pub async fn list(&self) -> Result<Vec<PlanEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_plans");
        let result = sqlx::query_as::<_, PlanEntity>(
            r#"
            SELECT code, name, monthly_credits, max_agents, price_cents, currency
            FROM subscription_plans
            ORDER BY price_cents, code
            "#,
        )
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn find_by_code(&self, code: &str) -> Result<Option<PlanEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_plan_by_code");
        let result = sqlx::query_as::<_, PlanEntity>(
            r#"
            SELECT code, name, monthly_credits, max_agents, price_cents, currency
            FROM subscription_plans
            WHERE code = $1
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }
}
