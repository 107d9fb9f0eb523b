//! OpenAI chat-completions responder over plain HTTPS.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::{ConversationResponder, SenderInfo, system_prompt};
use crate::error::ResponderError;

const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
const PROVIDER: &str = "openai";

/// Settings for [`OpenAiResponder`].
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: SecretString,
    pub model: String,
    pub endpoint: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub timeout: Duration,
}

impl OpenAiConfig {
    pub fn new(api_key: SecretString, model: impl Into<String>) -> Self {
        Self {
            api_key,
            model: model.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            max_tokens: 150,
            temperature: 0.7,
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
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

pub struct OpenAiResponder {
    config: OpenAiConfig,
    client: reqwest::Client,
}

impl OpenAiResponder {
    pub fn new(config: OpenAiConfig) -> Result<Self, ResponderError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ResponderError::RequestFailed {
                provider: PROVIDER.into(),
                reason: format!("Failed to build HTTP client: {e}"),
            })?;
        tracing::info!("Using OpenAI responder (model: {})", config.model);
        Ok(Self { config, client })
    }

    fn request_body(&self, text: &str, sender: &SenderInfo) -> serde_json::Value {
        serde_json::json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": system_prompt(sender) },
                { "role": "user", "content": text },
            ],
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
        })
    }
}

#[async_trait]
impl ConversationResponder for OpenAiResponder {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn respond(&self, text: &str, sender: &SenderInfo) -> Result<String, ResponderError> {
        let resp = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(self.config.api_key.expose_secret())
            .json(&self.request_body(text, sender))
            .send()
            .await
            .map_err(|e| ResponderError::RequestFailed {
                provider: PROVIDER.into(),
                reason: e.to_string(),
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ResponderError::RequestFailed {
                provider: PROVIDER.into(),
                reason: format!("HTTP {status}: {body}"),
            });
        }

        let completion: ChatCompletion =
            resp.json()
                .await
                .map_err(|e| ResponderError::InvalidResponse {
                    provider: PROVIDER.into(),
                    reason: e.to_string(),
                })?;

        extract_reply(completion)
    }
}

fn extract_reply(completion: ChatCompletion) -> Result<String, ResponderError> {
    completion
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ResponderError::InvalidResponse {
            provider: PROVIDER.into(),
            reason: "empty completion".into(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn responder() -> OpenAiResponder {
        let config = OpenAiConfig::new(SecretString::from("sk-test"), "gpt-4o");
        OpenAiResponder::new(config).unwrap()
    }

    #[test]
    fn request_body_carries_prompt_and_limits() {
        let body = responder().request_body("hi", &SenderInfo::new("u1", Some("Bob".into())));
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["max_tokens"], 150);
        assert_eq!(body["messages"][0]["role"], "system");
        assert!(
            body["messages"][0]["content"]
                .as_str()
                .unwrap()
                .contains("Sender name: Bob")
        );
        assert_eq!(body["messages"][1]["content"], "hi");
    }

    #[test]
    fn extract_reply_trims_content() {
        let completion: ChatCompletion = serde_json::from_value(serde_json::json!({
            "choices": [{ "message": { "content": "  Sure thing!\n" } }]
        }))
        .unwrap();
        assert_eq!(extract_reply(completion).unwrap(), "Sure thing!");
    }

    #[test]
    fn extract_reply_rejects_empty_choices() {
        let completion: ChatCompletion =
            serde_json::from_value(serde_json::json!({ "choices": [] })).unwrap();
        assert!(matches!(
            extract_reply(completion),
            Err(ResponderError::InvalidResponse { .. })
        ));
    }
}
