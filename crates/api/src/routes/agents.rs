//! Agent (AI persona + WhatsApp number) routes.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use domain::models::agent::{AgentResponse, CreateAgentRequest, UpdateAgentRequest};
use domain::models::{Agent, SubscriptionPlan};
use persistence::repositories::{AgentRepository, PlanRepository, UserRepository};
use serde::Serialize;
use shared::validation::normalize_phone;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::UserAuth;

#[derive(Debug, Serialize)]
pub struct AgentsResponse {
    pub agents: Vec<AgentResponse>,
}

fn agent_not_found() -> ApiError {
    ApiError::NotFound("Agent not found".to_string())
}

/// POST /api/v1/agents
///
/// 403 when the tenant's plan allows no more agents.
pub async fn create_agent(
    State(state): State<AppState>,
    auth: UserAuth,
    Json(request): Json<CreateAgentRequest>,
) -> Result<(StatusCode, Json<AgentResponse>), ApiError> {
    request.validate()?;
    let phone = normalize_phone(&request.phone_number)
        .map_err(|_| ApiError::Validation("Invalid phone number".to_string()))?;

    let user = UserRepository::new(state.pool.clone())
        .find_by_id(auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
    let plan: SubscriptionPlan = PlanRepository::new(state.pool.clone())
        .find_by_code(&user.plan_code)
        .await?
        .ok_or_else(|| ApiError::Internal(format!("Unknown plan {}", user.plan_code)))?
        .into();

    let agents = AgentRepository::new(state.pool.clone());
    let current = agents.count_for_user(auth.user_id).await?;
    if !plan.allows_another_agent(current) {
        return Err(ApiError::Forbidden(format!(
            "Plan {} allows at most {} agent(s)",
            plan.name, plan.max_agents
        )));
    }

    let entity = agents.create(auth.user_id, &phone, &request).await?;
    tracing::info!(agent_id = %entity.id, user_id = %auth.user_id, "Agent created");

    Ok((StatusCode::CREATED, Json(Agent::from(entity).into())))
}

/// GET /api/v1/agents
pub async fn list_agents(
    State(state): State<AppState>,
    auth: UserAuth,
) -> Result<Json<AgentsResponse>, ApiError> {
    let agents = AgentRepository::new(state.pool.clone())
        .list_for_user(auth.user_id)
        .await?
        .into_iter()
        .map(|e| Agent::from(e).into())
        .collect();
    Ok(Json(AgentsResponse { agents }))
}

/// GET /api/v1/agents/:id
pub async fn get_agent(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(id): Path<Uuid>,
) -> Result<Json<AgentResponse>, ApiError> {
    let entity = AgentRepository::new(state.pool.clone())
        .find_for_user(auth.user_id, id)
        .await?
        .ok_or_else(agent_not_found)?;
    Ok(Json(Agent::from(entity).into()))
}

/// PATCH /api/v1/agents/:id
pub async fn update_agent(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateAgentRequest>,
) -> Result<Json<AgentResponse>, ApiError> {
    request.validate()?;
    let entity = AgentRepository::new(state.pool.clone())
        .update(auth.user_id, id, &request)
        .await?
        .ok_or_else(agent_not_found)?;
    Ok(Json(Agent::from(entity).into()))
}

/// DELETE /api/v1/agents/:id
///
/// Conversations and campaigns of the agent go with it.
pub async fn delete_agent(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let deleted = AgentRepository::new(state.pool.clone())
        .delete(auth.user_id, id)
        .await?;
    if !deleted {
        return Err(agent_not_found());
    }
    tracing::info!(agent_id = %id, user_id = %auth.user_id, "Agent deleted");
    Ok(StatusCode::NO_CONTENT)
}
