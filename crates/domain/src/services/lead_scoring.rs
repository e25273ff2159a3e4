//! Lead scoring driven by message intent.

use lazy_static::lazy_static;
use regex::Regex;

use super::intent::MessageIntent;
use crate::models::LeadStatus;

pub const MAX_SCORE: i32 = 100;

lazy_static! {
    static ref EMAIL_RE: Regex =
        Regex::new(r"(?i)\b[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}\b").expect("valid email regex");
}

/// Score added to a lead for one inbound message.
pub fn score_delta(intent: MessageIntent) -> i32 {
    match intent {
        MessageIntent::Order => 30,
        MessageIntent::Question => 10,
        MessageIntent::Other => 2,
        MessageIntent::Refusal => 0,
    }
}

/// Applies [`score_delta`] and caps the result at [`MAX_SCORE`].
pub fn next_score(current: i32, intent: MessageIntent) -> i32 {
    current.saturating_add(score_delta(intent)).min(MAX_SCORE)
}

/// First email address found in a message.
pub fn extract_email(text: &str) -> Option<String> {
    EMAIL_RE.find(text).map(|m| m.as_str().to_lowercase())
}

/// Status of an existing lead after a message with `intent`.
pub fn status_after(intent: MessageIntent, current: LeadStatus) -> LeadStatus {
    match (intent, current) {
        (_, LeadStatus::Converted) => LeadStatus::Converted,
        (MessageIntent::Refusal, _) => LeadStatus::Lost,
        (MessageIntent::Order | MessageIntent::Question, LeadStatus::Lost) => LeadStatus::New,
        (_, status) => status,
    }
}

/// Whether a message should open a lead for a contact that has none.
pub fn opens_lead(intent: MessageIntent) -> bool {
    intent != MessageIntent::Refusal
}
