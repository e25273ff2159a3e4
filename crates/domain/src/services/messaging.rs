//! Outbound messaging and reply generation seams.
//!
//! The message pipeline and the campaign sender only talk to WhatsApp and to the
//! assistant through these traits, so both can be replaced by the mocks below in
//! tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::MessageDirection;

/// Acknowledgement from the gateway.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendReceipt {
    /// Message id assigned by the remote side, when it returns one.
    pub external_id: Option<String>,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway rejected the message ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("gateway request failed: {0}")]
    Transport(String),

    #[error("invalid gateway response: {0}")]
    InvalidResponse(String),
}

/// Sends text messages from a tenant's WhatsApp number.
#[async_trait::async_trait]
pub trait MessagingGateway: Send + Sync {
    async fn send_text(
        &self,
        sender_phone_number_id: &str,
        to: &str,
        body: &str,
    ) -> Result<SendReceipt, GatewayError>;
}

/// One past message handed to the assistant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryTurn {
    pub direction: MessageDirection,
    pub body: String,
}

/// Everything the assistant needs to answer one customer message.
#[derive(Debug, Clone)]
pub struct ReplyContext {
    pub agent_name: String,
    pub system_prompt: String,
    pub language: String,
    pub fallback_reply: String,
    pub contact_name: Option<String>,
    /// One line per active product.
    pub catalog: Vec<String>,
    /// Oldest first; does not include `message`.
    pub history: Vec<HistoryTurn>,
    pub message: String,
}

impl ReplyContext {
    /// System instructions: persona, language and catalog.
    pub fn system_message(&self) -> String {
        let mut out = String::new();
        out.push_str(self.system_prompt.trim());
        out.push_str(&format!(
            "\n\nTu es {}. Réponds dans la langue \"{}\", en messages courts adaptés à WhatsApp.",
            self.agent_name, self.language
        ));
        if let Some(name) = self.contact_name.as_deref().filter(|n| !n.is_empty()) {
            out.push_str(&format!("\nLe client s'appelle {}.", name));
        }
        if self.catalog.is_empty() {
            out.push_str("\nAucun produit n'est disponible pour le moment.");
        } else {
            out.push_str("\n\nCatalogue :\n");
            out.push_str(&self.catalog.join("\n"));
        }
        out
    }
}

#[derive(Debug, Error)]
pub enum ReplyError {
    #[error("assistant returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("assistant request failed: {0}")]
    Transport(String),

    #[error("assistant returned an empty reply")]
    EmptyReply,
}

/// Produces the AI answer to a customer message.
#[async_trait::async_trait]
pub trait ReplyGenerator: Send + Sync {
    async fn generate(&self, context: &ReplyContext) -> Result<String, ReplyError>;
}

/// Answers every message with the agent's fallback reply.
#[derive(Debug, Clone, Default)]
pub struct StaticReplyGenerator;

#[async_trait::async_trait]
impl ReplyGenerator for StaticReplyGenerator {
    async fn generate(&self, context: &ReplyContext) -> Result<String, ReplyError> {
        Ok(context.fallback_reply.clone())
    }
}

/// A message captured by [`MockMessagingGateway`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub sender_phone_number_id: String,
    pub to: String,
    pub body: String,
}

/// In-memory gateway for tests.
#[derive(Debug, Default)]
pub struct MockMessagingGateway {
    /// Whether every send fails.
    pub simulate_failure: bool,
    failing_numbers: Mutex<HashSet<String>>,
    sent: Mutex<Vec<SentMessage>>,
}

impl MockMessagingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            simulate_failure: true,
            ..Self::default()
        }
    }

    /// Makes sends to `phone` fail.
    pub fn fail_for(&self, phone: &str) {
        if let Ok(mut numbers) = self.failing_numbers.lock() {
            numbers.insert(phone.to_string());
        }
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl MessagingGateway for MockMessagingGateway {
    async fn send_text(
        &self,
        sender_phone_number_id: &str,
        to: &str,
        body: &str,
    ) -> Result<SendReceipt, GatewayError> {
        let blocked = self
            .failing_numbers
            .lock()
            .map(|n| n.contains(to))
            .unwrap_or(false);
        if self.simulate_failure || blocked {
            return Err(GatewayError::Rejected {
                status: 400,
                message: format!("recipient {} unavailable", to),
            });
        }

        let mut sent = self
            .sent
            .lock()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        sent.push(SentMessage {
            sender_phone_number_id: sender_phone_number_id.to_string(),
            to: to.to_string(),
            body: body.to_string(),
        });
        Ok(SendReceipt {
            external_id: Some(format!("mock-{}", sent.len())),
        })
    }
}

/// Reply generator with a canned answer for tests.
#[derive(Debug)]
pub struct MockReplyGenerator {
    pub reply: String,
    pub simulate_failure: bool,
    calls: AtomicUsize,
}

impl MockReplyGenerator {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            simulate_failure: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: String::new(),
            simulate_failure: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ReplyGenerator for MockReplyGenerator {
    async fn generate(&self, _context: &ReplyContext) -> Result<String, ReplyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.simulate_failure {
            return Err(ReplyError::Transport("simulated failure".to_string()));
        }
        Ok(self.reply.clone())
    }
}
