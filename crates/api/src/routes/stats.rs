//! Dashboard statistics.

use axum::{extract::State, Json};
use domain::models::DashboardStats;
use persistence::repositories::StatsRepository;
use serde::Serialize;

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::UserAuth;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    #[serde(flatten)]
    pub stats: DashboardStats,
    pub conversion_rate_percent: i64,
}

/// GET /api/v1/stats
pub async fn get_stats(
    State(state): State<AppState>,
    auth: UserAuth,
) -> Result<Json<StatsResponse>, ApiError> {
    let stats = StatsRepository::new(state.pool.clone())
        .dashboard(auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(StatsResponse {
        conversion_rate_percent: stats.conversion_rate_percent(),
        stats,
    }))
}
