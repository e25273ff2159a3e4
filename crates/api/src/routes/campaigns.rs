//! Bulk campaign routes.
//!
//! Campaigns are created as drafts (or scheduled right away when a date is
//! given); the dispatch job picks up scheduled ones once they are due.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use domain::models::campaign::{
    normalize_recipients, CampaignDetail, CreateCampaignRequest, ScheduleCampaignRequest,
    MAX_RECIPIENTS,
};
use domain::models::{Campaign, CampaignStatus, Recipient};
use persistence::repositories::{AgentRepository, CampaignRepository};
use serde::{Deserialize, Serialize};
use shared::pagination::clamp_limit;
use shared::validation::validate_template;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::{ApiError, ValidationDetail};
use crate::middleware::UserAuth;

#[derive(Debug, Serialize)]
pub struct CampaignsResponse {
    pub campaigns: Vec<Campaign>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListCampaignsQuery {
    pub limit: Option<i64>,
}

fn invalid(field: &str, message: impl Into<String>) -> ApiError {
    ApiError::InvalidFields(vec![ValidationDetail {
        field: field.to_string(),
        message: message.into(),
    }])
}

/// POST /api/v1/campaigns
pub async fn create_campaign(
    State(state): State<AppState>,
    auth: UserAuth,
    Json(request): Json<CreateCampaignRequest>,
) -> Result<(StatusCode, Json<Campaign>), ApiError> {
    request.validate()?;

    validate_template(&request.message_template).map_err(|e| {
        invalid(
            "message_template",
            e.message
                .map(|m| m.to_string())
                .unwrap_or_else(|| "Invalid message template".to_string()),
        )
    })?;

    let recipients = normalize_recipients(&request.recipients)
        .map_err(|phone| invalid("recipients", format!("Invalid phone number: {}", phone)))?;
    if recipients.is_empty() {
        return Err(invalid("recipients", "At least one recipient is required"));
    }
    if recipients.len() > MAX_RECIPIENTS {
        return Err(invalid(
            "recipients",
            format!("A campaign cannot exceed {} recipients", MAX_RECIPIENTS),
        ));
    }

    AgentRepository::new(state.pool.clone())
        .find_for_user(auth.user_id, request.agent_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Agent not found".to_string()))?;

    let status = if request.scheduled_at.is_some() {
        CampaignStatus::Scheduled
    } else {
        CampaignStatus::Draft
    };

    let campaign = CampaignRepository::new(state.pool.clone())
        .create(
            auth.user_id,
            request.agent_id,
            request.name.trim(),
            &request.message_template,
            &recipients,
            status,
            request.scheduled_at,
        )
        .await?;

    info!(
        user_id = %auth.user_id,
        campaign_id = %campaign.id,
        recipients = recipients.len(),
        status = %status,
        "Campaign created"
    );

    Ok((StatusCode::CREATED, Json(campaign.into())))
}

/// GET /api/v1/campaigns
pub async fn list_campaigns(
    State(state): State<AppState>,
    auth: UserAuth,
    Query(query): Query<ListCampaignsQuery>,
) -> Result<Json<CampaignsResponse>, ApiError> {
    let campaigns = CampaignRepository::new(state.pool.clone())
        .list_for_user(auth.user_id, clamp_limit(query.limit))
        .await?
        .into_iter()
        .map(Campaign::from)
        .collect();
    Ok(Json(CampaignsResponse { campaigns }))
}

/// GET /api/v1/campaigns/:id
pub async fn get_campaign(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(id): Path<Uuid>,
) -> Result<Json<CampaignDetail>, ApiError> {
    let repo = CampaignRepository::new(state.pool.clone());
    let campaign: Campaign = repo
        .find_for_user(auth.user_id, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Campaign not found".to_string()))?
        .into();

    let recipients: Vec<Recipient> = repo
        .recipients(id, MAX_RECIPIENTS as i64)
        .await?
        .into_iter()
        .map(Recipient::from)
        .collect();

    Ok(Json(CampaignDetail {
        progress_percent: campaign.progress_percent(),
        campaign,
        recipients,
    }))
}

/// POST /api/v1/campaigns/:id/schedule
///
/// Without a date the campaign is due immediately.
pub async fn schedule_campaign(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(id): Path<Uuid>,
    body: Option<Json<ScheduleCampaignRequest>>,
) -> Result<Json<Campaign>, ApiError> {
    let scheduled_at = body
        .and_then(|Json(request)| request.scheduled_at)
        .unwrap_or_else(Utc::now);

    transition(
        &state,
        auth.user_id,
        id,
        &[CampaignStatus::Draft, CampaignStatus::Scheduled],
        CampaignStatus::Scheduled,
        Some(scheduled_at),
    )
    .await
}

/// POST /api/v1/campaigns/:id/cancel
///
/// A campaign being sent stops before its next recipient.
pub async fn cancel_campaign(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(id): Path<Uuid>,
) -> Result<Json<Campaign>, ApiError> {
    transition(
        &state,
        auth.user_id,
        id,
        &[
            CampaignStatus::Draft,
            CampaignStatus::Scheduled,
            CampaignStatus::Sending,
        ],
        CampaignStatus::Cancelled,
        None,
    )
    .await
}

async fn transition(
    state: &AppState,
    user_id: Uuid,
    id: Uuid,
    from: &[CampaignStatus],
    to: CampaignStatus,
    scheduled_at: Option<chrono::DateTime<Utc>>,
) -> Result<Json<Campaign>, ApiError> {
    let repo = CampaignRepository::new(state.pool.clone());

    if let Some(updated) = repo
        .transition(user_id, id, from, to, scheduled_at)
        .await?
    {
        info!(user_id = %user_id, campaign_id = %id, status = %to, "Campaign status changed");
        return Ok(Json(updated.into()));
    }

    // Either missing or in a status the move is not allowed from.
    match repo.find_for_user(user_id, id).await? {
        Some(current) => Err(ApiError::Conflict(format!(
            "Cannot move campaign from {} to {}",
            current.status(),
            to
        ))),
        None => Err(ApiError::NotFound("Campaign not found".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_field_error() {
        match invalid("recipients", "At least one recipient is required") {
            ApiError::InvalidFields(details) => {
                assert_eq!(details.len(), 1);
                assert_eq!(details[0].field, "recipients");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_schedule_body_is_optional_date() {
        let request: ScheduleCampaignRequest = serde_json::from_str("{}").unwrap();
        assert!(request.scheduled_at.is_none());

        let request: ScheduleCampaignRequest =
            serde_json::from_str(r#"{"scheduledAt":"2026-03-01T09:00:00Z"}"#).unwrap();
        assert!(request.scheduled_at.is_some());
    }
}
