//! Chat-completion client generating agent replies.
//!
//! Speaks the OpenAI-compatible `POST /chat/completions` protocol, which most
//! hosted and self-hosted model servers accept.

use std::time::Duration;

use async_trait::async_trait;
use domain::models::MessageDirection;
use domain::services::{ReplyContext, ReplyError, ReplyGenerator};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::AssistantConfig;

#[derive(Debug, Serialize, PartialEq, Eq)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

pub struct ChatCompletionClient {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl ChatCompletionClient {
    pub fn new(config: &AssistantConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}/chat/completions",
                config.api_base_url.trim_end_matches('/')
            ),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        })
    }
}

/// System prompt, then history, then the customer message.
fn build_messages(context: &ReplyContext) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(context.history.len() + 2);
    messages.push(ChatMessage {
        role: "system",
        content: context.system_message(),
    });
    for turn in &context.history {
        messages.push(ChatMessage {
            role: match turn.direction {
                MessageDirection::Inbound => "user",
                MessageDirection::Outbound => "assistant",
            },
            content: turn.body.clone(),
        });
    }
    messages.push(ChatMessage {
        role: "user",
        content: context.message.clone(),
    });
    messages
}

#[async_trait]
impl ReplyGenerator for ChatCompletionClient {
    async fn generate(&self, context: &ReplyContext) -> Result<String, ReplyError> {
        let request = ChatRequest {
            model: &self.model,
            messages: build_messages(context),
            max_tokens: self.max_tokens,
            temperature: 0.4,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ReplyError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ReplyError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ReplyError::Transport(format!("invalid response: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or(ReplyError::EmptyReply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::services::HistoryTurn;

    fn context() -> ReplyContext {
        ReplyContext {
            agent_name: "Fatou".to_string(),
            system_prompt: "Boutique de cosmétiques.".to_string(),
            language: "fr".to_string(),
            fallback_reply: "Un conseiller revient vers vous.".to_string(),
            contact_name: None,
            catalog: vec![],
            history: vec![
                HistoryTurn {
                    direction: MessageDirection::Inbound,
                    body: "Bonjour".to_string(),
                },
                HistoryTurn {
                    direction: MessageDirection::Outbound,
                    body: "Bonjour, que puis-je pour vous ?".to_string(),
                },
            ],
            message: "Vous livrez à Thiès ?".to_string(),
        }
    }

    #[test]
    fn test_build_messages_order_and_roles() {
        let messages = build_messages(&context());
        let roles: Vec<&str> = messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec!["system", "user", "assistant", "user"]);
        assert_eq!(messages[3].content, "Vous livrez à Thiès ?");
    }

    #[test]
    fn test_response_parsing() {
        let parsed: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"index":0,"message":{"role":"assistant","content":"  Oui !  "}}]}"#,
        )
        .unwrap();
        assert_eq!(
            parsed.choices[0].message.content.as_deref().map(str::trim),
            Some("Oui !")
        );
    }

    #[test]
    fn test_endpoint_from_config() {
        let client = ChatCompletionClient::new(&AssistantConfig {
            api_base_url: "http://localhost:11434/v1/".to_string(),
            ..AssistantConfig::default()
        })
        .unwrap();
        assert_eq!(client.endpoint, "http://localhost:11434/v1/chat/completions");
    }
}
