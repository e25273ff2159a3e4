//! Subscription plan catalog.

use axum::{extract::State, Json};
use domain::models::SubscriptionPlan;
use persistence::repositories::PlanRepository;
use serde::Serialize;

use crate::app::AppState;
use crate::error::ApiError;

#[derive(Debug, Serialize)]
pub struct PlansResponse {
    pub plans: Vec<SubscriptionPlan>,
}

/// GET /api/v1/plans
pub async fn list_plans(State(state): State<AppState>) -> Result<Json<PlansResponse>, ApiError> {
    let plans = PlanRepository::new(state.pool.clone())
        .list()
        .await?
        .into_iter()
        .map(SubscriptionPlan::from)
        .collect();
    Ok(Json(PlansResponse { plans }))
}
