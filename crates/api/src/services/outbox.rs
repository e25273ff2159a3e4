//! Sends a message into a conversation and records the attempt.

use std::sync::Arc;

use domain::models::{DeliveryStatus, Message};
use domain::services::{GatewayError, MessagingGateway};
use persistence::repositories::{ConversationRepository, MessageRepository};
use sqlx::PgPool;
use uuid::Uuid;

/// Where an outbound message goes.
#[derive(Debug, Clone, Copy)]
pub struct Recipient<'a> {
    pub sender_phone_number_id: &'a str,
    pub conversation_id: Uuid,
    pub contact_phone: &'a str,
}

/// Stored outbound message plus the gateway error when delivery failed.
#[derive(Debug)]
pub struct Delivery {
    pub message: Message,
    pub error: Option<GatewayError>,
}

impl Delivery {
    pub fn delivered(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Clone)]
pub struct Outbox {
    gateway: Arc<dyn MessagingGateway>,
    messages: MessageRepository,
    conversations: ConversationRepository,
}

impl Outbox {
    pub fn new(pool: PgPool, gateway: Arc<dyn MessagingGateway>) -> Self {
        Self {
            gateway,
            messages: MessageRepository::new(pool.clone()),
            conversations: ConversationRepository::new(pool),
        }
    }

    /// Sends `body` through the gateway. The message is stored as `sent` or
    /// `failed` either way; only database errors are returned.
    pub async fn send(&self, to: Recipient<'_>, body: &str) -> Result<Delivery, sqlx::Error> {
        let result = self
            .gateway
            .send_text(to.sender_phone_number_id, to.contact_phone, body)
            .await;

        let (entity, error) = match result {
            Ok(receipt) => {
                let entity = self
                    .messages
                    .insert_outbound(
                        to.conversation_id,
                        body,
                        receipt.external_id.as_deref(),
                        DeliveryStatus::Sent,
                        None,
                    )
                    .await?;
                (entity, None)
            }
            Err(e) => {
                tracing::warn!(
                    conversation_id = %to.conversation_id,
                    error = %e,
                    "Outbound message not delivered"
                );
                let entity = self
                    .messages
                    .insert_outbound(
                        to.conversation_id,
                        body,
                        None,
                        DeliveryStatus::Failed,
                        Some(&e.to_string()),
                    )
                    .await?;
                (entity, Some(e))
            }
        };

        self.conversations.touch(to.conversation_id).await?;

        Ok(Delivery {
            message: entity.into(),
            error,
        })
    }
}
