//! Anthropic messages API adapter.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::http::{build_client, non_empty, post_json};
use super::{Backend, BackendConfig, Provider};
use crate::errors::BackendError;

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    system: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: Option<String>,
}

pub struct AnthropicBackend {
    config: BackendConfig,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl AnthropicBackend {
    /// Build the adapter. A missing key is reported on first use, not here.
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
impl Backend for AnthropicBackend {
    fn id(&self) -> &str {
        &self.config.id
    }

    fn provider(&self) -> Provider {
        Provider::Anthropic
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

        let body = MessagesRequest {
            model: &self.config.model,
            system: instruction,
            max_tokens: self.config.max_tokens,
            messages: vec![Message {
                role: "user",
                content: context,
            }],
        };

        let request = self
            .client
            .post(format!("{}/messages", self.config.base_url()))
            .header("x-api-key", api_key)
            .header("anthropic-version", API_VERSION);

        let response: MessagesResponse =
            post_json(&self.config.id, self.timeout(), request, &body).await?;

        let text = response
            .content
            .into_iter()
            .filter(|block| block.block_type == "text")
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");

        non_empty(&self.config.id, text)
    }
}
