//! Google Gemini `generateContent` adapter.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::http::{build_client, non_empty, post_json};
use super::{Backend, BackendConfig, Provider};
use crate::errors::BackendError;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateResponse {
    fn text(self) -> String {
        self.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default()
    }
}

pub struct GeminiBackend {
    config: BackendConfig,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl GeminiBackend {
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
impl Backend for GeminiBackend {
    fn id(&self) -> &str {
        &self.config.id
    }

    fn provider(&self) -> Provider {
        Provider::Gemini
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

        let body = GenerateRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part { text: instruction }],
            },
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part { text: context }],
            }],
            generation_config: GenerationConfig {
                max_output_tokens: self.config.max_tokens,
            },
        };

        let request = self
            .client
            .post(format!(
                "{}/models/{}:generateContent",
                self.config.base_url(),
                self.config.model
            ))
            .header("x-goog-api-key", api_key);

        let response: GenerateResponse =
            post_json(&self.config.id, self.timeout(), request, &body).await?;

        non_empty(&self.config.id, response.text())
    }
}
