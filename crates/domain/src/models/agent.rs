//! AI agent domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Reply sent when a customer declines and the agent has no custom text.
pub const DEFAULT_REFUSAL_REPLY: &str =
    "Très bien, merci pour votre retour. N'hésitez pas à revenir vers nous si besoin !";

/// Reply sent when the assistant cannot produce an answer.
pub const DEFAULT_FALLBACK_REPLY: &str =
    "Merci pour votre message, un conseiller vous répondra très vite.";

/// An AI persona bound to one WhatsApp number of a tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub agent_id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub phone_number: String,
    /// Sender id on the WhatsApp gateway for this number.
    pub whatsapp_phone_number_id: String,
    pub system_prompt: String,
    pub language: String,
    pub fallback_reply: Option<String>,
    pub refusal_reply: Option<String>,
    pub auto_reply: bool,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Agent {
    pub fn refusal_reply(&self) -> &str {
        self.refusal_reply
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(DEFAULT_REFUSAL_REPLY)
    }

    pub fn fallback_reply(&self) -> &str {
        self.fallback_reply
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(DEFAULT_FALLBACK_REPLY)
    }
}

fn default_language() -> String {
    "fr".to_string()
}

fn default_true() -> bool {
    true
}

/// Request payload for creating an agent.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateAgentRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    pub phone_number: String,

    #[validate(length(min = 1, max = 64, message = "WhatsApp phone number id is required"))]
    pub whatsapp_phone_number_id: String,

    #[validate(length(max = 8000, message = "System prompt cannot exceed 8000 characters"))]
    #[serde(default)]
    pub system_prompt: String,

    #[validate(length(min = 2, max = 5, message = "Language must be an ISO code"))]
    #[serde(default = "default_language")]
    pub language: String,

    #[validate(length(max = 1000, message = "Fallback reply cannot exceed 1000 characters"))]
    pub fallback_reply: Option<String>,

    #[validate(length(max = 1000, message = "Refusal reply cannot exceed 1000 characters"))]
    pub refusal_reply: Option<String>,

    #[serde(default = "default_true")]
    pub auto_reply: bool,
}

/// Request payload for updating an agent (partial update).
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAgentRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,

    #[validate(length(max = 8000, message = "System prompt cannot exceed 8000 characters"))]
    pub system_prompt: Option<String>,

    #[validate(length(min = 2, max = 5, message = "Language must be an ISO code"))]
    pub language: Option<String>,

    #[validate(length(max = 1000, message = "Fallback reply cannot exceed 1000 characters"))]
    pub fallback_reply: Option<String>,

    #[validate(length(max = 1000, message = "Refusal reply cannot exceed 1000 characters"))]
    pub refusal_reply: Option<String>,

    pub auto_reply: Option<bool>,

    pub active: Option<bool>,
}

/// Response payload for agent operations.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentResponse {
    pub agent_id: Uuid,
    pub name: String,
    pub phone_number: String,
    pub whatsapp_phone_number_id: String,
    pub system_prompt: String,
    pub language: String,
    pub fallback_reply: Option<String>,
    pub refusal_reply: Option<String>,
    pub auto_reply: bool,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Agent> for AgentResponse {
    fn from(a: Agent) -> Self {
        Self {
            agent_id: a.agent_id,
            name: a.name,
            phone_number: a.phone_number,
            whatsapp_phone_number_id: a.whatsapp_phone_number_id,
            system_prompt: a.system_prompt,
            language: a.language,
            fallback_reply: a.fallback_reply,
            refusal_reply: a.refusal_reply,
            auto_reply: a.auto_reply,
            active: a.active,
            created_at: a.created_at,
            updated_at: a.updated_at,
        }
    }
}
