//! Inbound WhatsApp message processing.
//!
//! One customer message goes through: conversation upsert, idempotent insert,
//! intent classification, lead tracking, then at most one reply (refusal
//! acknowledgement, order recap or assistant answer).

use std::sync::Arc;

use domain::models::conversation::InboundMessage;
use domain::models::{Agent, LeadStatus, Message, OrderItem, Product};
use domain::services::lead_scoring::{extract_email, next_score, opens_lead, status_after};
use domain::services::template::order_summary;
use domain::services::{
    classify, detect_items, DetectedItem, HistoryTurn, MessageIntent, MessagingGateway,
    ReplyContext, ReplyGenerator,
};
use persistence::entities::{ConversationEntity, MessageEntity};
use persistence::repositories::{
    AgentRepository, ConversationRepository, LeadRepository, MessageRepository, OrderRepository,
    ProductRepository, UserRepository,
};
use serde::Serialize;
use shared::validation::normalize_phone;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::error::ApiError;
use crate::middleware::metrics::{record_ai_reply, record_message_received, record_order_created};
use crate::services::events::{EventHub, TenantEvent};
use crate::services::outbox::{Outbox, Recipient};

const LEAD_SOURCE: &str = "whatsapp";

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Agent not found or inactive")]
    AgentNotFound,

    #[error("Invalid sender: {0}")]
    InvalidSender(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::AgentNotFound => ApiError::NotFound(err.to_string()),
            PipelineError::InvalidSender(reason) => ApiError::Validation(reason),
            PipelineError::Database(e) => e.into(),
        }
    }
}

/// What kind of reply the pipeline sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyKind {
    Refusal,
    OrderSummary,
    Assistant,
    Fallback,
}

/// Result of processing one inbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PipelineOutcome {
    /// Redelivery of a message already stored.
    Duplicate,
    /// Stored without reply (AI paused or auto-reply off).
    Stored,
    #[serde(rename_all = "camelCase")]
    Replied {
        kind: ReplyKind,
        order_id: Option<Uuid>,
        delivered: bool,
    },
    /// Stored, but the tenant has no credits left for an AI reply.
    CreditsExhausted,
}

/// Knobs of the assistant reply step.
#[derive(Debug, Clone, Copy)]
pub struct PipelineSettings {
    pub reply_cost: i32,
    pub history_limit: i64,
}

#[derive(Clone)]
pub struct MessagePipeline {
    agents: AgentRepository,
    conversations: ConversationRepository,
    messages: MessageRepository,
    leads: LeadRepository,
    products: ProductRepository,
    orders: OrderRepository,
    users: UserRepository,
    outbox: Outbox,
    replies: Arc<dyn ReplyGenerator>,
    events: EventHub,
    settings: PipelineSettings,
}

impl MessagePipeline {
    pub fn new(
        pool: PgPool,
        gateway: Arc<dyn MessagingGateway>,
        replies: Arc<dyn ReplyGenerator>,
        events: EventHub,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            agents: AgentRepository::new(pool.clone()),
            conversations: ConversationRepository::new(pool.clone()),
            messages: MessageRepository::new(pool.clone()),
            leads: LeadRepository::new(pool.clone()),
            products: ProductRepository::new(pool.clone()),
            orders: OrderRepository::new(pool.clone()),
            users: UserRepository::new(pool.clone()),
            outbox: Outbox::new(pool, gateway),
            replies,
            events,
            settings,
        }
    }

    /// Processes one message received by `agent_id`.
    #[tracing::instrument(skip(self, inbound), fields(message_id = %inbound.message_id))]
    pub async fn process_inbound(
        &self,
        agent_id: Uuid,
        inbound: InboundMessage,
    ) -> Result<PipelineOutcome, PipelineError> {
        let agent: Agent = self
            .agents
            .find_by_id(agent_id)
            .await?
            .filter(|a| a.active)
            .ok_or(PipelineError::AgentNotFound)?
            .into();

        let phone = normalize_phone(&inbound.from)
            .map_err(|_| PipelineError::InvalidSender(format!("'{}' is not a phone number", inbound.from)))?;
        let contact_name = inbound
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty());

        let conversation = self
            .conversations
            .upsert(agent.agent_id, agent.user_id, &phone, contact_name)
            .await?;

        let intent = classify(&inbound.text);
        let Some(stored) = self
            .messages
            .claim_inbound(conversation.id, &inbound.text, intent, &inbound.message_id)
            .await?
        else {
            tracing::debug!(conversation_id = %conversation.id, "Duplicate inbound message ignored");
            return Ok(PipelineOutcome::Duplicate);
        };

        // An unprocessed message is released on failure and picked up again
        // by the gateway's redelivery.
        let stored_id = stored.id;
        match self
            .handle(&agent, &conversation, intent, &inbound, contact_name, stored)
            .await
        {
            Ok(outcome) => {
                if let Err(e) = self.messages.finish_inbound(stored_id).await {
                    tracing::warn!(message_id = stored_id, error = %e, "Failed to mark inbound message processed");
                }
                Ok(outcome)
            }
            Err(e) => {
                if let Err(release) = self.messages.release_inbound(stored_id).await {
                    tracing::warn!(message_id = stored_id, error = %release, "Failed to release inbound message");
                }
                Err(e)
            }
        }
    }

    async fn handle(
        &self,
        agent: &Agent,
        conversation: &ConversationEntity,
        intent: MessageIntent,
        inbound: &InboundMessage,
        contact_name: Option<&str>,
        stored: MessageEntity,
    ) -> Result<PipelineOutcome, PipelineError> {
        record_message_received(intent.as_str());

        self.track_lead(agent, conversation, intent, &inbound.text, contact_name)
            .await?;

        let inbound_id = stored.id;
        self.events.publish(
            agent.user_id,
            TenantEvent::MessageReceived {
                conversation_id: conversation.id,
                intent,
                message: stored.into(),
            },
        );

        if conversation.ai_paused || !agent.auto_reply {
            tracing::debug!(
                conversation_id = %conversation.id,
                ai_paused = conversation.ai_paused,
                auto_reply = agent.auto_reply,
                "Reply skipped"
            );
            return Ok(PipelineOutcome::Stored);
        }

        match intent {
            MessageIntent::Refusal => self.reply_refusal(agent, conversation).await,
            MessageIntent::Order => {
                let catalog = self.catalog(agent.user_id).await?;
                let detected = detect_items(&inbound.text, &catalog);
                if detected.is_empty() {
                    self.reply_assistant(agent, conversation, inbound_id, &inbound.text, catalog)
                        .await
                } else {
                    self.reply_order(agent, conversation, &detected, &catalog)
                        .await
                }
            }
            MessageIntent::Question | MessageIntent::Other => {
                let catalog = self.catalog(agent.user_id).await?;
                self.reply_assistant(agent, conversation, inbound_id, &inbound.text, catalog)
                    .await
            }
        }
    }

    async fn catalog(&self, user_id: Uuid) -> Result<Vec<Product>, sqlx::Error> {
        Ok(self
            .products
            .list_for_user(user_id, false)
            .await?
            .into_iter()
            .map(Product::from)
            .collect())
    }

    async fn track_lead(
        &self,
        agent: &Agent,
        conversation: &ConversationEntity,
        intent: MessageIntent,
        text: &str,
        contact_name: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        let email = extract_email(text);
        match self
            .leads
            .find_by_phone(agent.user_id, &conversation.contact_phone)
            .await?
        {
            Some(lead) => {
                let status = status_after(intent, lead.status());
                let score = next_score(lead.score, intent);
                self.leads
                    .record_activity(lead.id, status, score, contact_name, email.as_deref())
                    .await?;
            }
            None if opens_lead(intent) => {
                let lead = self
                    .leads
                    .create(
                        agent.user_id,
                        Some(conversation.id),
                        &conversation.contact_phone,
                        contact_name,
                        email.as_deref(),
                        LeadStatus::New,
                        next_score(0, intent),
                        LEAD_SOURCE,
                    )
                    .await?;
                tracing::info!(lead_id = %lead.id, user_id = %agent.user_id, "Lead opened");
            }
            None => {}
        }
        Ok(())
    }

    async fn reply_refusal(
        &self,
        agent: &Agent,
        conversation: &ConversationEntity,
    ) -> Result<PipelineOutcome, PipelineError> {
        let cancelled = self
            .orders
            .cancel_pending_for_conversation(conversation.id)
            .await?;
        if !cancelled.is_empty() {
            tracing::info!(
                conversation_id = %conversation.id,
                count = cancelled.len(),
                "Pending orders cancelled after refusal"
            );
            self.events.publish(
                agent.user_id,
                TenantEvent::OrdersCancelled {
                    conversation_id: conversation.id,
                    order_ids: cancelled,
                },
            );
        }

        let delivered = self
            .send(agent, conversation, agent.refusal_reply())
            .await?;
        Ok(PipelineOutcome::Replied {
            kind: ReplyKind::Refusal,
            order_id: None,
            delivered,
        })
    }

    async fn reply_order(
        &self,
        agent: &Agent,
        conversation: &ConversationEntity,
        detected: &[DetectedItem],
        catalog: &[Product],
    ) -> Result<PipelineOutcome, PipelineError> {
        let Some((currency, items)) = price_items(detected, catalog) else {
            return Ok(PipelineOutcome::Stored);
        };

        let order = self
            .orders
            .create(
                agent.user_id,
                Some(conversation.id),
                &conversation.contact_phone,
                &currency,
                &items,
            )
            .await?;
        record_order_created();
        tracing::info!(
            order_id = %order.order_id,
            user_id = %agent.user_id,
            total_cents = order.total_cents,
            "Order created from conversation"
        );

        self.leads
            .promote_by_phone(agent.user_id, &conversation.contact_phone, LeadStatus::Qualified)
            .await?;

        let summary = order_summary(&order, &agent.language);
        let order_id = order.order_id;
        self.events
            .publish(agent.user_id, TenantEvent::OrderCreated { order });

        let delivered = self.send(agent, conversation, &summary).await?;
        Ok(PipelineOutcome::Replied {
            kind: ReplyKind::OrderSummary,
            order_id: Some(order_id),
            delivered,
        })
    }

    async fn reply_assistant(
        &self,
        agent: &Agent,
        conversation: &ConversationEntity,
        inbound_id: i64,
        text: &str,
        catalog: Vec<Product>,
    ) -> Result<PipelineOutcome, PipelineError> {
        let cost = self.settings.reply_cost;
        if self.users.debit_credits(agent.user_id, cost).await?.is_none() {
            tracing::info!(user_id = %agent.user_id, "No credits left for an AI reply");
            record_ai_reply("no_credits");
            self.events.publish(
                agent.user_id,
                TenantEvent::CreditsExhausted {
                    agent_id: agent.agent_id,
                    conversation_id: Some(conversation.id),
                },
            );
            return Ok(PipelineOutcome::CreditsExhausted);
        }

        let recent = match self
            .messages
            .recent(conversation.id, inbound_id, self.settings.history_limit)
            .await
        {
            Ok(recent) => recent,
            Err(e) => {
                self.refund(agent.user_id, cost).await;
                return Err(e.into());
            }
        };
        let history = recent
            .into_iter()
            .map(|m| {
                let message: Message = m.into();
                HistoryTurn {
                    direction: message.direction,
                    body: message.body,
                }
            })
            .collect();

        let context = ReplyContext {
            agent_name: agent.name.clone(),
            system_prompt: agent.system_prompt.clone(),
            language: agent.language.clone(),
            fallback_reply: agent.fallback_reply().to_string(),
            contact_name: conversation.contact_name.clone(),
            catalog: catalog.iter().map(Product::catalog_line).collect(),
            history,
            message: text.to_string(),
        };

        let (kind, body) = match self.replies.generate(&context).await {
            Ok(reply) => {
                record_ai_reply("generated");
                (ReplyKind::Assistant, reply)
            }
            Err(e) => {
                tracing::warn!(
                    conversation_id = %conversation.id,
                    error = %e,
                    "Reply generation failed, using fallback"
                );
                record_ai_reply("fallback");
                self.refund(agent.user_id, cost).await;
                (ReplyKind::Fallback, context.fallback_reply)
            }
        };

        let delivered = self.send(agent, conversation, &body).await?;
        Ok(PipelineOutcome::Replied {
            kind,
            order_id: None,
            delivered,
        })
    }

    async fn refund(&self, user_id: Uuid, cost: i32) {
        if let Err(e) = self.users.refund_credits(user_id, cost).await {
            tracing::error!(user_id = %user_id, error = %e, "Failed to refund reply credits");
        }
    }

    async fn send(
        &self,
        agent: &Agent,
        conversation: &ConversationEntity,
        body: &str,
    ) -> Result<bool, sqlx::Error> {
        let delivery = self
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
        let delivered = delivery.delivered();
        self.events.publish(
            agent.user_id,
            TenantEvent::ReplySent {
                conversation_id: conversation.id,
                message: delivery.message,
            },
        );
        Ok(delivered)
    }
}

/// Prices detected items at current catalog prices. Lines in another currency
/// than the first one are dropped.
fn price_items(detected: &[DetectedItem], catalog: &[Product]) -> Option<(String, Vec<OrderItem>)> {
    let mut currency: Option<&str> = None;
    let mut items = Vec::with_capacity(detected.len());

    for item in detected {
        let Some(product) = catalog.iter().find(|p| p.product_id == item.product_id) else {
            continue;
        };
        let order_currency = *currency.get_or_insert(product.currency.as_str());
        if product.currency != order_currency {
            tracing::debug!(product_id = %product.product_id, "Skipping line in another currency");
            continue;
        }
        items.push(OrderItem {
            product_id: product.product_id,
            product_name: product.name.clone(),
            quantity: item.quantity,
            unit_price_cents: product.price_cents,
        });
    }

    let currency = currency?.to_string();
    if items.is_empty() {
        None
    } else {
        Some((currency, items))
    }
}
