//! WhatsApp Cloud API gateway.
//!
//! Sends plain text messages through `POST /{phone_number_id}/messages`. When
//! the gateway is disabled in configuration, [`LoggingGateway`] stands in and
//! only logs what would have been sent.

use std::time::Duration;

use async_trait::async_trait;
use domain::services::{GatewayError, MessagingGateway, SendReceipt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::WhatsAppConfig;

#[derive(Debug, Serialize)]
struct TextMessageRequest<'a> {
    messaging_product: &'static str,
    recipient_type: &'static str,
    to: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    text: TextBody<'a>,
}

#[derive(Debug, Serialize)]
struct TextBody<'a> {
    preview_url: bool,
    body: &'a str,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(default)]
    messages: Vec<SentMessageId>,
}

#[derive(Debug, Deserialize)]
struct SentMessageId {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// HTTP client for the WhatsApp Cloud API.
pub struct WhatsAppCloudGateway {
    client: Client,
    base_url: String,
    access_token: String,
}

impl WhatsAppCloudGateway {
    pub fn new(config: &WhatsAppConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone(),
        })
    }

    fn messages_url(&self, sender_phone_number_id: &str) -> String {
        format!("{}/{}/messages", self.base_url, sender_phone_number_id)
    }
}

/// The Cloud API wants the number without its leading `+`.
fn wire_number(to: &str) -> &str {
    to.trim_start_matches('+')
}

fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    serde_json::from_str::<ErrorResponse>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| {
            if body.is_empty() {
                status.to_string()
            } else {
                body.to_string()
            }
        })
}

#[async_trait]
impl MessagingGateway for WhatsAppCloudGateway {
    async fn send_text(
        &self,
        sender_phone_number_id: &str,
        to: &str,
        body: &str,
    ) -> Result<SendReceipt, GatewayError> {
        let request = TextMessageRequest {
            messaging_product: "whatsapp",
            recipient_type: "individual",
            to: wire_number(to),
            kind: "text",
            text: TextBody {
                preview_url: false,
                body,
            },
        };

        let response = self
            .client
            .post(self.messages_url(sender_phone_number_id))
            .bearer_auth(&self.access_token)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Transport("request timed out".to_string())
                } else {
                    GatewayError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                message: error_message(status, &text),
            });
        }

        let parsed: SendResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        let external_id = parsed.messages.into_iter().next().map(|m| m.id);
        debug!(to = %to, external_id = ?external_id, "WhatsApp message accepted");

        Ok(SendReceipt { external_id })
    }
}

/// Gateway used when WhatsApp delivery is disabled.
#[derive(Debug, Default)]
pub struct LoggingGateway;

#[async_trait]
impl MessagingGateway for LoggingGateway {
    async fn send_text(
        &self,
        sender_phone_number_id: &str,
        to: &str,
        body: &str,
    ) -> Result<SendReceipt, GatewayError> {
        info!(
            sender = %sender_phone_number_id,
            to = %to,
            chars = body.chars().count(),
            "WhatsApp delivery disabled, message not sent"
        );
        Ok(SendReceipt { external_id: None })
    }
}
