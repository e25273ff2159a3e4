//! Conversation and message models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::services::intent::MessageIntent;

/// A thread between one agent and one customer phone number.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub conversation_id: Uuid,
    pub agent_id: Uuid,
    pub user_id: Uuid,
    pub contact_phone: String,
    pub contact_name: Option<String>,
    /// Set when a human took over; the assistant stays silent.
    pub ai_paused: bool,
    pub last_message_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Direction of a message relative to the tenant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageDirection {
    Inbound,
    Outbound,
}

impl MessageDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageDirection::Inbound => "inbound",
            MessageDirection::Outbound => "outbound",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "inbound" => Some(MessageDirection::Inbound),
            "outbound" => Some(MessageDirection::Outbound),
            _ => None,
        }
    }
}

/// Delivery state of a message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Received,
    Sent,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Received => "received",
            DeliveryStatus::Sent => "sent",
            DeliveryStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "received" => Some(DeliveryStatus::Received),
            "sent" => Some(DeliveryStatus::Sent),
            "failed" => Some(DeliveryStatus::Failed),
            _ => None,
        }
    }
}

/// One message of a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: i64,
    pub message_id: Uuid,
    pub conversation_id: Uuid,
    pub direction: MessageDirection,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<MessageIntent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    pub delivery_status: DeliveryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Inbound message as delivered by the WhatsApp gateway webhook.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct InboundMessage {
    /// Sender phone number or WhatsApp id.
    pub from: String,

    /// Profile name of the sender, when the gateway provides one.
    #[validate(length(max = 200, message = "Name cannot exceed 200 characters"))]
    pub name: Option<String>,

    #[validate(length(max = 4096, message = "Text cannot exceed 4096 characters"))]
    #[serde(default)]
    pub text: String,

    /// Gateway message id, used to drop redeliveries.
    #[validate(length(min = 1, max = 255, message = "Message id is required"))]
    pub message_id: String,

    /// Unix timestamp (seconds) reported by the gateway.
    pub timestamp: Option<i64>,
}

/// Request body for a manual reply typed by an operator.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ManualReplyRequest {
    #[validate(length(min = 1, max = 4096, message = "Reply must be 1-4096 characters"))]
    pub body: String,
}

/// Query parameters for listing conversations.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListConversationsQuery {
    pub agent_id: Option<Uuid>,
    pub limit: Option<i64>,
}

/// Query parameters for message history.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageHistoryQuery {
    pub cursor: Option<String>,
    pub limit: Option<i64>,
}

/// Paginated message history.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePage {
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}
