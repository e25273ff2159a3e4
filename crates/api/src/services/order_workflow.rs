//! Operator decisions on orders.
//!
//! State changes and stock movements happen in the repository transaction;
//! this layer adds the lead update, the customer notice and the live event.

use std::sync::Arc;

use domain::models::{Agent, LeadStatus, Order, OrderStatus};
use domain::services::template::{order_rejected_notice, order_validated_notice};
use domain::services::MessagingGateway;
use persistence::repositories::{
    AgentRepository, ConversationRepository, LeadRepository, OrderRepository, OrderUpdateError,
};
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::error::ApiError;
use crate::services::events::{EventHub, TenantEvent};
use crate::services::outbox::{Outbox, Recipient};

#[derive(Debug, Error)]
pub enum OrderWorkflowError {
    #[error(transparent)]
    Update(#[from] OrderUpdateError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<OrderWorkflowError> for ApiError {
    fn from(err: OrderWorkflowError) -> Self {
        match err {
            OrderWorkflowError::Update(e) => e.into(),
            OrderWorkflowError::Database(e) => e.into(),
        }
    }
}

#[derive(Clone)]
pub struct OrderWorkflow {
    orders: OrderRepository,
    leads: LeadRepository,
    conversations: ConversationRepository,
    agents: AgentRepository,
    outbox: Outbox,
    events: EventHub,
}

impl OrderWorkflow {
    pub fn new(pool: PgPool, gateway: Arc<dyn MessagingGateway>, events: EventHub) -> Self {
        Self {
            orders: OrderRepository::new(pool.clone()),
            leads: LeadRepository::new(pool.clone()),
            conversations: ConversationRepository::new(pool.clone()),
            agents: AgentRepository::new(pool.clone()),
            outbox: Outbox::new(pool, gateway),
            events,
        }
    }

    /// Confirms a pending order and takes its items out of stock.
    pub async fn validate(&self, user_id: Uuid, order_id: Uuid) -> Result<Order, OrderWorkflowError> {
        let order = self.orders.validate(user_id, order_id).await?;
        tracing::info!(order_id = %order_id, user_id = %user_id, "Order validated");

        self.leads
            .promote_by_phone(user_id, &order.contact_phone, LeadStatus::Converted)
            .await?;
        self.notify(&order, |o, lang| order_validated_notice(o, lang))
            .await;
        Ok(self.publish(order))
    }

    pub async fn reject(
        &self,
        user_id: Uuid,
        order_id: Uuid,
        reason: Option<&str>,
    ) -> Result<Order, OrderWorkflowError> {
        let order = self
            .orders
            .transition(user_id, order_id, OrderStatus::Rejected, reason)
            .await?;
        tracing::info!(order_id = %order_id, user_id = %user_id, "Order rejected");

        self.notify(&order, |o, lang| order_rejected_notice(o, reason, lang))
            .await;
        Ok(self.publish(order))
    }

    /// Cancels a pending or validated order; validated orders are restocked.
    pub async fn cancel(&self, user_id: Uuid, order_id: Uuid) -> Result<Order, OrderWorkflowError> {
        let order = self
            .orders
            .transition(user_id, order_id, OrderStatus::Cancelled, None)
            .await?;
        tracing::info!(order_id = %order_id, user_id = %user_id, "Order cancelled");
        Ok(self.publish(order))
    }

    pub async fn mark_delivered(
        &self,
        user_id: Uuid,
        order_id: Uuid,
    ) -> Result<Order, OrderWorkflowError> {
        let order = self
            .orders
            .transition(user_id, order_id, OrderStatus::Delivered, None)
            .await?;
        tracing::info!(order_id = %order_id, user_id = %user_id, "Order delivered");
        Ok(self.publish(order))
    }

    fn publish(&self, order: Order) -> Order {
        self.events.publish(
            order.user_id,
            TenantEvent::OrderUpdated {
                order: order.clone(),
            },
        );
        order
    }

    /// Tells the customer through the agent that took the order. The decision
    /// stands even when the notice cannot be sent.
    async fn notify<F>(&self, order: &Order, compose: F)
    where
        F: FnOnce(&Order, &str) -> String,
    {
        let Some(conversation_id) = order.conversation_id else {
            return;
        };
        if let Err(e) = self.try_notify(order, conversation_id, compose).await {
            tracing::warn!(order_id = %order.order_id, error = %e, "Order notice not recorded");
        }
    }

    async fn try_notify<F>(
        &self,
        order: &Order,
        conversation_id: Uuid,
        compose: F,
    ) -> Result<(), sqlx::Error>
    where
        F: FnOnce(&Order, &str) -> String,
    {
        let Some(conversation) = self
            .conversations
            .find_for_user(order.user_id, conversation_id)
            .await?
        else {
            return Ok(());
        };
        let Some(agent) = self
            .agents
            .find_by_id(conversation.agent_id)
            .await?
            .filter(|a| a.active)
            .map(Agent::from)
        else {
            tracing::debug!(order_id = %order.order_id, "Agent inactive, order notice skipped");
            return Ok(());
        };

        let body = compose(order, &agent.language);
        let delivery = self
            .outbox
            .send(
                Recipient {
                    sender_phone_number_id: &agent.whatsapp_phone_number_id,
                    conversation_id: conversation.id,
                    contact_phone: &conversation.contact_phone,
                },
                &body,
            )
            .await?;

        self.events.publish(
            order.user_id,
            TenantEvent::ReplySent {
                conversation_id: conversation.id,
                message: delivery.message,
            },
        );
        Ok(())
    }
}
