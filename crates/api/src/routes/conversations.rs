//! Conversation inbox: listing, history, AI pause and manual replies.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use domain::models::conversation::{
    ListConversationsQuery, ManualReplyRequest, MessageHistoryQuery, MessagePage,
};
use domain::models::{Conversation, Message};
use persistence::entities::ConversationEntity;
use persistence::repositories::{AgentRepository, ConversationRepository, MessageRepository};
use serde::Serialize;
use shared::pagination::{clamp_limit, decode_cursor, encode_cursor};
use tracing::warn;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::UserAuth;
use crate::services::events::TenantEvent;
use crate::services::outbox::Recipient;

#[derive(Debug, Serialize)]
pub struct ConversationsResponse {
    pub conversations: Vec<Conversation>,
}

async fn load_conversation(
    state: &AppState,
    user_id: Uuid,
    id: Uuid,
) -> Result<ConversationEntity, ApiError> {
    ConversationRepository::new(state.pool.clone())
        .find_for_user(user_id, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Conversation not found".to_string()))
}

/// GET /api/v1/conversations?agentId=&limit=
pub async fn list_conversations(
    State(state): State<AppState>,
    auth: UserAuth,
    Query(query): Query<ListConversationsQuery>,
) -> Result<Json<ConversationsResponse>, ApiError> {
    let conversations = ConversationRepository::new(state.pool.clone())
        .list_for_user(auth.user_id, query.agent_id, clamp_limit(query.limit))
        .await?
        .into_iter()
        .map(Conversation::from)
        .collect();
    Ok(Json(ConversationsResponse { conversations }))
}

/// GET /api/v1/conversations/:id/messages?cursor=&limit=
///
/// Newest first. `nextCursor` is present while older messages remain.
pub async fn list_messages(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(id): Path<Uuid>,
    Query(query): Query<MessageHistoryQuery>,
) -> Result<Json<MessagePage>, ApiError> {
    let conversation = load_conversation(&state, auth.user_id, id).await?;

    let cursor = query
        .cursor
        .as_deref()
        .map(decode_cursor)
        .transpose()
        .map_err(|e| ApiError::Validation(e.to_string()))?;
    let limit = clamp_limit(query.limit);

    let mut rows = MessageRepository::new(state.pool.clone())
        .page(conversation.id, cursor, limit)
        .await?;

    let has_more = rows.len() as i64 > limit;
    rows.truncate(limit as usize);
    let next_cursor = if has_more {
        rows.last().map(|m| encode_cursor(m.created_at, m.id))
    } else {
        None
    };

    Ok(Json(MessagePage {
        messages: rows.into_iter().map(Message::from).collect(),
        next_cursor,
    }))
}

/// POST /api/v1/conversations/:id/pause
pub async fn pause_conversation(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(id): Path<Uuid>,
) -> Result<Json<Conversation>, ApiError> {
    set_paused(&state, auth.user_id, id, true).await
}

/// POST /api/v1/conversations/:id/resume
pub async fn resume_conversation(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(id): Path<Uuid>,
) -> Result<Json<Conversation>, ApiError> {
    set_paused(&state, auth.user_id, id, false).await
}

async fn set_paused(
    state: &AppState,
    user_id: Uuid,
    id: Uuid,
    paused: bool,
) -> Result<Json<Conversation>, ApiError> {
    ConversationRepository::new(state.pool.clone())
        .set_ai_paused(user_id, id, paused)
        .await?
        .map(|c| Json(c.into()))
        .ok_or_else(|| ApiError::NotFound("Conversation not found".to_string()))
}

/// POST /api/v1/conversations/:id/reply
///
/// Operator replies are free. The message is stored even when WhatsApp
/// refuses it; the caller then gets a 502.
pub async fn send_reply(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(id): Path<Uuid>,
    Json(request): Json<ManualReplyRequest>,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    request.validate()?;
    let body = request.body.trim();
    if body.is_empty() {
        return Err(ApiError::Validation("Reply cannot be blank".to_string()));
    }

    let conversation = load_conversation(&state, auth.user_id, id).await?;
    let agent = AgentRepository::new(state.pool.clone())
        .find_for_user(auth.user_id, conversation.agent_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Agent not found".to_string()))?;

    let delivery = state
        .outbox
        .send(
            Recipient {
                sender_phone_number_id: &agent.whatsapp_phone_number_id,
                conversation_id: conversation.id,
                contact_phone: &conversation.contact_phone,
            },
            body,
        )
        .await?;

    state.events.publish(
        auth.user_id,
        TenantEvent::ReplySent {
            conversation_id: conversation.id,
            message: delivery.message.clone(),
        },
    );

    match delivery.error {
        Some(error) => {
            warn!(conversation_id = %conversation.id, error = %error, "Manual reply not delivered");
            Err(ApiError::BadGateway(error.to_string()))
        }
        None => Ok((StatusCode::CREATED, Json(delivery.message))),
    }
}
