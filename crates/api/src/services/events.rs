//! Live tenant events pushed to the dashboard over server-sent events.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use domain::models::{CampaignStatus, Message, Order};
use domain::services::MessageIntent;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use uuid::Uuid;

/// Events buffered per tenant before its slow readers start losing them.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Something the dashboard of one tenant should redraw.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TenantEvent {
    #[serde(rename_all = "camelCase")]
    MessageReceived {
        conversation_id: Uuid,
        intent: MessageIntent,
        message: Message,
    },
    #[serde(rename_all = "camelCase")]
    ReplySent {
        conversation_id: Uuid,
        message: Message,
    },
    OrderCreated { order: Order },
    OrderUpdated { order: Order },
    #[serde(rename_all = "camelCase")]
    OrdersCancelled {
        conversation_id: Uuid,
        order_ids: Vec<Uuid>,
    },
    #[serde(rename_all = "camelCase")]
    CreditsExhausted {
        agent_id: Uuid,
        conversation_id: Option<Uuid>,
    },
    #[serde(rename_all = "camelCase")]
    CampaignProgress {
        campaign_id: Uuid,
        status: CampaignStatus,
        sent_count: i32,
        failed_count: i32,
        total_recipients: i32,
    },
}

impl TenantEvent {
    /// SSE event name.
    pub fn name(&self) -> &'static str {
        match self {
            TenantEvent::MessageReceived { .. } => "message_received",
            TenantEvent::ReplySent { .. } => "reply_sent",
            TenantEvent::OrderCreated { .. } => "order_created",
            TenantEvent::OrderUpdated { .. } => "order_updated",
            TenantEvent::OrdersCancelled { .. } => "orders_cancelled",
            TenantEvent::CreditsExhausted { .. } => "credits_exhausted",
            TenantEvent::CampaignProgress { .. } => "campaign_progress",
        }
    }
}

type Channels = HashMap<Uuid, broadcast::Sender<TenantEvent>>;

/// Fan-out of tenant events, one broadcast channel per tenant so a busy tenant
/// cannot push another tenant's readers into lag. Cloning shares the channels.
#[derive(Debug, Clone)]
pub struct EventHub {
    channels: Arc<RwLock<Channels>>,
    capacity: usize,
}

impl EventHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    /// Publishes to every subscriber of `user_id`. Returns how many received
    /// it; 0 when the tenant has no open stream.
    pub fn publish(&self, user_id: Uuid, event: TenantEvent) -> usize {
        tracing::debug!(user_id = %user_id, event = event.name(), "Publishing tenant event");
        let delivered = {
            let channels = self.channels.read().unwrap_or_else(PoisonError::into_inner);
            match channels.get(&user_id) {
                Some(tx) => tx.send(event).ok(),
                None => return 0,
            }
        };
        match delivered {
            Some(count) => count,
            None => {
                // Every reader of this tenant went away
                self.prune(user_id);
                0
            }
        }
    }

    /// Events of one tenant. Events dropped because the reader lagged are skipped.
    pub fn subscribe(&self, user_id: Uuid) -> impl Stream<Item = TenantEvent> + Send + 'static {
        let rx = {
            let mut channels = self.channels.write().unwrap_or_else(PoisonError::into_inner);
            channels
                .entry(user_id)
                .or_insert_with(|| broadcast::channel(self.capacity).0)
                .subscribe()
        };
        BroadcastStream::new(rx).filter_map(move |item| match item {
            Ok(event) => Some(event),
            Err(lagged) => {
                tracing::warn!(user_id = %user_id, error = %lagged, "Event subscriber lagged");
                None
            }
        })
    }

    /// Open streams across all tenants.
    pub fn subscriber_count(&self) -> usize {
        self.channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(broadcast::Sender::receiver_count)
            .sum()
    }

    fn prune(&self, user_id: Uuid) {
        let mut channels = self.channels.write().unwrap_or_else(PoisonError::into_inner);
        if channels.get(&user_id).is_some_and(|tx| tx.receiver_count() == 0) {
            channels.remove(&user_id);
        }
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress(campaign_id: Uuid) -> TenantEvent {
        TenantEvent::CampaignProgress {
            campaign_id,
            status: CampaignStatus::Sending,
            sent_count: 1,
            failed_count: 0,
            total_recipients: 3,
        }
    }

    #[test]
    fn test_publish_without_subscribers() {
        let hub = EventHub::default();
        assert_eq!(hub.publish(Uuid::new_v4(), progress(Uuid::new_v4())), 0);
    }

    #[tokio::test]
    async fn test_subscriber_only_sees_own_tenant() {
        let hub = EventHub::new(16);
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let mut stream = Box::pin(hub.subscribe(alice));

        let bob_campaign = Uuid::new_v4();
        let alice_campaign = Uuid::new_v4();
        hub.publish(bob, progress(bob_campaign));
        hub.publish(alice, progress(alice_campaign));

        match stream.next().await {
            Some(TenantEvent::CampaignProgress { campaign_id, .. }) => {
                assert_eq!(campaign_id, alice_campaign)
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_busy_tenant_does_not_lag_others() {
        let hub = EventHub::new(4);
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let mut alice_stream = Box::pin(hub.subscribe(alice));
        let _bob_stream = hub.subscribe(bob);

        let alice_campaign = Uuid::new_v4();
        hub.publish(alice, progress(alice_campaign));
        for _ in 0..32 {
            hub.publish(bob, progress(Uuid::new_v4()));
        }

        match alice_stream.next().await {
            Some(TenantEvent::CampaignProgress { campaign_id, .. }) => {
                assert_eq!(campaign_id, alice_campaign)
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_closed_streams_are_pruned() {
        let hub = EventHub::default();
        let alice = Uuid::new_v4();
        let stream = hub.subscribe(alice);
        assert_eq!(hub.subscriber_count(), 1);
        assert_eq!(hub.publish(alice, progress(Uuid::new_v4())), 1);

        drop(stream);
        assert_eq!(hub.publish(alice, progress(Uuid::new_v4())), 0);
        assert_eq!(hub.subscriber_count(), 0);
        assert!(hub.channels.read().unwrap().is_empty());
    }

    #[test]
    fn test_event_serialization() {
        let id = Uuid::new_v4();
        let json = serde_json::to_value(TenantEvent::CreditsExhausted {
            agent_id: id,
            conversation_id: None,
        })
        .unwrap();
        assert_eq!(json["type"], "credits_exhausted");
        assert_eq!(json["agentId"], id.to_string());
        assert_eq!(
            TenantEvent::CreditsExhausted {
                agent_id: id,
                conversation_id: None
            }
            .name(),
            "credits_exhausted"
        );
    }
}
