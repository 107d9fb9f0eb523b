//! Assisted-conversation responder.
//!
//! The router forwards messages from correspondents with an active session to
//! a [`ConversationResponder`]. Responders are fallible and possibly slow; the
//! router never holds a store lock while awaiting one.

mod openai;

pub use openai::{OpenAiConfig, OpenAiResponder};

use async_trait::async_trait;
use serde::Serialize;

use crate::error::ResponderError;

/// What the responder knows about the sender.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SenderInfo {
    pub key: String,
    pub display_name: Option<String>,
}

impl SenderInfo {
    pub fn new(key: impl Into<String>, display_name: Option<String>) -> Self {
        Self {
            key: key.into(),
            display_name,
        }
    }
}

#[async_trait]
pub trait ConversationResponder: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Produce a reply to `text`.
    async fn respond(&self, text: &str, sender: &SenderInfo) -> Result<String, ResponderError>;
}

/// Responder used when no backend is configured. Always unavailable.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableResponder;

#[async_trait]
impl ConversationResponder for UnavailableResponder {
    fn name(&self) -> &str {
        "unavailable"
    }

    async fn respond(&self, _text: &str, _sender: &SenderInfo) -> Result<String, ResponderError> {
        Err(ResponderError::Unavailable)
    }
}

/// System prompt for the assisted conversation.
pub fn system_prompt(sender: &SenderInfo) -> String {
    let context = match sender.display_name.as_deref() {
        Some(name) if !name.trim().is_empty() => format!("Sender name: {name}"),
        _ => "Unknown sender".to_string(),
    };
    format!(
        "You are a helpful messaging assistant replying on behalf of the phone owner.\n\n\
         Guidelines:\n\
         - Keep replies short (one to three sentences)\n\
         - Be friendly and professional\n\
         - If asked about availability, say the owner will get back to them soon\n\
         - For urgent matters, suggest calling directly\n\
         - Only say you are an AI if asked directly\n\
         - Ask for clarification politely when something is unclear\n\n\
         Context: {context}"
    )
}
