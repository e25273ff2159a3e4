//! Lead routes.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use domain::models::lead::{ListLeadsQuery, UpdateLeadRequest};
use domain::models::Lead;
use persistence::repositories::LeadRepository;
use serde::Serialize;
use shared::pagination::clamp_limit;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::UserAuth;

#[derive(Debug, Serialize)]
pub struct LeadsResponse {
    pub leads: Vec<Lead>,
}

/// GET /api/v1/leads?status=&limit=
pub async fn list_leads(
    State(state): State<AppState>,
    auth: UserAuth,
    Query(query): Query<ListLeadsQuery>,
) -> Result<Json<LeadsResponse>, ApiError> {
    let leads = LeadRepository::new(state.pool.clone())
        .list_for_user(auth.user_id, query.status, clamp_limit(query.limit))
        .await?
        .into_iter()
        .map(Lead::from)
        .collect();
    Ok(Json(LeadsResponse { leads }))
}

/// PATCH /api/v1/leads/:id
///
/// Status changes follow the lead funnel; an illegal move is a 409.
pub async fn update_lead(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateLeadRequest>,
) -> Result<Json<Lead>, ApiError> {
    request.validate()?;
    let repo = LeadRepository::new(state.pool.clone());

    let current = repo
        .find_for_user(auth.user_id, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Lead not found".to_string()))?;

    if let Some(next) = request.status {
        let from = current.status();
        if next != from && !from.can_transition_to(next) {
            return Err(ApiError::Conflict(format!(
                "Cannot move lead from {} to {}",
                from.as_str(),
                next.as_str()
            )));
        }
    }

    let updated = repo
        .update(
            auth.user_id,
            id,
            request.status,
            request.name.as_deref(),
            request.email.as_deref(),
            request.notes.as_deref(),
        )
        .await?
        .ok_or_else(|| ApiError::NotFound("Lead not found".to_string()))?;
    Ok(Json(updated.into()))
}
