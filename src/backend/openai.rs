//! OpenAI chat completions adapter.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::http::{build_client, non_empty, post_json};
use super::{Backend, BackendConfig, Provider};
use crate::errors::BackendError;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_completion_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
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
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenAiBackend {
    config: BackendConfig,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OpenAiBackend {
    pub fn new(config: BackendConfig) -> Result<Self, BackendError> {
        let client = build_client(&config.id, config.timeout())?;
        let api_key = config.resolve_api_key();
        Ok(Self {
            config,
            api_key,
            client,
        })
    }
}

#[async_trait]
impl Backend for OpenAiBackend {
    fn id(&self) -> &str {
        &self.config.id
    }

    fn provider(&self) -> Provider {
        Provider::OpenAi
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    fn timeout(&self) -> Duration {
        self.config.timeout()
    }

    async fn generate(&self, instruction: &str, context: &str) -> Result<String, BackendError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            BackendError::configuration(
                &self.config.id,
                format!("{} not configured", self.config.key_env().unwrap_or("API key")),
            )
        })?;

        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: instruction,
                },
                ChatMessage {
                    role: "user",
                    content: context,
                },
            ],
            max_completion_tokens: self.config.max_tokens,
        };

        let request = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url()))
            .bearer_auth(api_key);

        let response: ChatResponse =
            post_json(&self.config.id, self.timeout(), request, &body).await?;

        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        non_empty(&self.config.id, text)
    }
}
