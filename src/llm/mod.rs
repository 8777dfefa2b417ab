//! Chat completion clients

mod ollama;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use ollama::OllamaChat;

use crate::Result;

/// Author of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// One message in a chat exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    /// System instruction
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// User turn
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Produces a reply for a list of messages
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Return the content of the model's first reply
    ///
    /// # Errors
    ///
    /// Returns error on network, HTTP or decoding failures
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String>;

    /// Model identifier for logging
    fn model(&self) -> &str;
}
