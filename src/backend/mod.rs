//! Generative backends behind one capability interface.
//!
//! Every provider is reached through [`Backend::generate`]: an instruction
//! (system-level task description or rubric) plus a context payload in, raw
//! text or a typed [`BackendError`] out. Provider SDK differences stay inside
//! the adapters.
//!
//! | Module      | Responsibility                                         |
//! |-------------|--------------------------------------------------------|
//! | `openai`    | OpenAI chat completions adapter                        |
//! | `anthropic` | Anthropic messages adapter                             |
//! | `gemini`    | Google Gemini `generateContent` adapter                |
//! | `http`      | Shared reqwest plumbing and error mapping              |
//! | `factory`   | `build_backend()` from a `BackendConfig`               |
//! | `scripted`  | Deterministic in-process backend for tests and offline |
//!
//! Backends never retry. [`invoke`] adds the per-backend timeout so a hung
//! provider cannot stall its caller past its own deadline.

pub mod anthropic;
pub mod factory;
pub mod gemini;
mod http;
pub mod openai;
pub mod scripted;

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::Instrument;

use crate::errors::BackendError;

pub use factory::{UnavailableBackend, build_backend};
pub use scripted::{ScriptedBackend, ScriptedReply};

/// Default per-call timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
/// Default completion budget.
pub const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Supported provider families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAi,
    Anthropic,
    Gemini,
    Scripted,
}

impl Provider {
    /// Environment variable holding this provider's key, when none is configured.
    pub fn default_key_env(self) -> Option<&'static str> {
        match self {
            Provider::OpenAi => Some("OPENAI_API_KEY"),
            Provider::Anthropic => Some("ANTHROPIC_API_KEY"),
            Provider::Gemini => Some("GEMINI_API_KEY"),
            Provider::Scripted => None,
        }
    }

    pub fn default_base_url(self) -> &'static str {
        match self {
            Provider::OpenAi => openai::DEFAULT_BASE_URL,
            Provider::Anthropic => anthropic::DEFAULT_BASE_URL,
            Provider::Gemini => gemini::DEFAULT_BASE_URL,
            Provider::Scripted => "",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Anthropic => "anthropic",
            Provider::Gemini => "gemini",
            Provider::Scripted => "scripted",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAi),
            "anthropic" => Ok(Provider::Anthropic),
            "gemini" | "google" => Ok(Provider::Gemini),
            "scripted" => Ok(Provider::Scripted),
            _ => Err(format!(
                "Invalid provider: '{}'. Valid values: openai, anthropic, gemini, scripted",
                s
            )),
        }
    }
}

/// Explicit configuration for one backend instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Identifier used in logs, reports and config references.
    pub id: String,
    pub provider: Provider,
    pub model: String,
    /// Inline API key. Prefer `api_key_env`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Environment variable to read the key from (defaults per provider).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    /// Override for the provider's API root, e.g. a proxy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

impl BackendConfig {
    pub fn new(id: &str, provider: Provider, model: &str) -> Self {
        Self {
            id: id.to_string(),
            provider,
            model: model.to_string(),
            api_key: None,
            api_key_env: None,
            base_url: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn with_api_key(mut self, key: &str) -> Self {
        self.api_key = Some(key.to_string());
        self
    }

    pub fn with_api_key_env(mut self, var: &str) -> Self {
        self.api_key_env = Some(var.to_string());
        self
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = Some(url.to_string());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs().max(1);
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Name of the environment variable consulted for the key.
    pub fn key_env(&self) -> Option<&str> {
        self.api_key_env
            .as_deref()
            .or_else(|| self.provider.default_key_env())
    }

    /// Inline key first, then the environment. Blank values count as absent.
    pub fn resolve_api_key(&self) -> Option<String> {
        let inline = self
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(String::from);

        inline.or_else(|| {
            self.key_env()
                .and_then(|var| std::env::var(var).ok())
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.provider.default_base_url())
            .trim_end_matches('/')
    }
}

/// A generative text service.
#[async_trait]
pub trait Backend: Send + Sync {
    fn id(&self) -> &str;

    fn provider(&self) -> Provider;

    fn model(&self) -> &str;

    /// Deadline applied by [`invoke`].
    fn timeout(&self) -> Duration;

    /// Send an instruction and context, return the raw reply text.
    async fn generate(&self, instruction: &str, context: &str) -> Result<String, BackendError>;
}

/// Call a backend once under its own timeout.
///
/// Every failure path resolves to a `BackendError`; nothing is retried.
pub async fn invoke(
    backend: &dyn Backend,
    instruction: &str,
    context: &str,
) -> Result<String, BackendError> {
    let span = tracing::info_span!(
        "backend_invoke",
        backend = %backend.id(),
        provider = %backend.provider(),
        model = %backend.model(),
    );

    async move {
        let start = Instant::now();
        let deadline = backend.timeout();

        let result = match tokio::time::timeout(deadline, backend.generate(instruction, context))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(BackendError::Timeout {
                backend: backend.id().to_string(),
                after: deadline,
            }),
        };

        let elapsed_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(text) => tracing::debug!(elapsed_ms, chars = text.len(), "backend replied"),
            Err(e) => {
                tracing::warn!(elapsed_ms, kind = e.kind(), error = %e, "backend call failed")
            }
        }

        result
    }
    .instrument(span)
    .await
}

/// Shared handle to any backend.
pub type SharedBackend = Arc<dyn Backend>;
