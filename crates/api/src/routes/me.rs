//! Current tenant profile.

use axum::{extract::State, Json};
use domain::models::{SubscriptionPlan, User};
use persistence::repositories::{AgentRepository, PlanRepository, UserRepository};
use serde::Serialize;

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::UserAuth;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub user: User,
    pub plan: Option<SubscriptionPlan>,
    pub agent_count: i64,
    pub plan_expired: bool,
}

/// GET /api/v1/me
pub async fn get_me(
    State(state): State<AppState>,
    auth: UserAuth,
) -> Result<Json<MeResponse>, ApiError> {
    let user: User = UserRepository::new(state.pool.clone())
        .find_by_id(auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?
        .into();

    let plan = PlanRepository::new(state.pool.clone())
        .find_by_code(&user.plan_code)
        .await?
        .map(SubscriptionPlan::from);
    let agent_count = AgentRepository::new(state.pool.clone())
        .count_for_user(auth.user_id)
        .await?;

    Ok(Json(MeResponse {
        plan_expired: user.is_plan_expired(chrono::Utc::now()),
        user,
        plan,
        agent_count,
    }))
}
