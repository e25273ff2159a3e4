//! Domain services for SEVEN T.
//!
//! Pure message analysis plus the seams to external messaging systems.

pub mod intent;
pub mod lead_scoring;
pub mod messaging;
pub mod order_detection;
pub mod template;
pub mod text;

pub use intent::{classify, MessageIntent};
pub use messaging::{
    GatewayError, HistoryTurn, MessagingGateway, MockMessagingGateway, MockReplyGenerator,
    ReplyContext, ReplyError, ReplyGenerator, SendReceipt, SentMessage, StaticReplyGenerator,
};
pub use order_detection::{detect_items, DetectedItem};
pub use template::{render, TemplateVars};
