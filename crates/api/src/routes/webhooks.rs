//! Inbound WhatsApp webhook.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use domain::models::conversation::InboundMessage;
use shared::crypto::verify_signature;
use tracing::{debug, warn};
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::services::PipelineOutcome;

pub const SIGNATURE_HEADER: &str = "x-signature-256";

/// Checks the `X-Signature-256: sha256=<hex>` header against the raw body.
/// An empty secret disables the check.
pub fn verify_webhook_signature(
    secret: &str,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<(), ApiError> {
    if secret.is_empty() {
        return Ok(());
    }

    let header = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing webhook signature".to_string()))?;

    if verify_signature(secret, body, header) {
        Ok(())
    } else {
        Err(ApiError::Unauthorized("Invalid webhook signature".to_string()))
    }
}

/// POST /api/v1/webhooks/whatsapp/:agent_id
///
/// Redeliveries of an already stored message answer 200 with a `duplicate`
/// outcome so the gateway stops retrying.
pub async fn receive_whatsapp(
    State(state): State<AppState>,
    Path(agent_id): Path<Uuid>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<PipelineOutcome>, ApiError> {
    if let Err(err) = verify_webhook_signature(&state.config.whatsapp.webhook_secret, &headers, &body)
    {
        warn!(agent_id = %agent_id, "Rejected webhook with bad signature");
        return Err(err);
    }

    let inbound: InboundMessage = serde_json::from_slice(&body)
        .map_err(|e| ApiError::Validation(format!("Invalid webhook payload: {}", e)))?;
    inbound.validate()?;

    debug!(agent_id = %agent_id, message_id = %inbound.message_id, "Webhook received");

    let outcome = state.pipeline.process_inbound(agent_id, inbound).await?;
    Ok(Json(outcome))
}
