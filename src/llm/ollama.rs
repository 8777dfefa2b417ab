//! Ollama `/api/chat` client

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use super::{ChatMessage, ChatModel};
use crate::{Error, Result};

/// Non-streaming chat client for an Ollama host
pub struct OllamaChat {
    client: reqwest::Client,
    endpoint: Url,
    model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
}

impl OllamaChat {
    /// Create a client for `model` on the host at `base_url`
    ///
    /// # Errors
    ///
    /// Returns error if the URL is invalid or the HTTP client cannot be built
    pub fn new(base_url: &str, model: String, timeout: Option<Duration>) -> Result<Self> {
        let mut base = Url::parse(base_url)?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(Error::Config(format!("Ollama host must be http(s): {base_url}")));
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let endpoint = base.join("api/chat")?;

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        tracing::debug!(endpoint = %endpoint, model = %model, "ollama client ready");

        Ok(Self {
            client: builder.build()?,
            endpoint,
            model,
        })
    }

    #[cfg(test)]
    const fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl ChatModel for OllamaChat {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages,
            stream: false,
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Chat(format!("Ollama error {status}: {body}")));
        }

        let reply: ChatResponse = response.json().await?;
        let content = reply.message.content.trim();
        if content.is_empty() {
            return Err(Error::Chat("model returned an empty reply".to_string()));
        }

        Ok(content.to_string())
    }

    fn model(&self) -> &str {
        &self.model
    }
}
