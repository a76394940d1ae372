//! Backend construction from configuration.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::anthropic::AnthropicBackend;
use super::gemini::GeminiBackend;
use super::openai::OpenAiBackend;
use super::{Backend, BackendConfig, Provider};
use crate::errors::BackendError;

/// Build a backend from its configuration.
///
/// Never fails: a backend that cannot be constructed becomes an
/// [`UnavailableBackend`] that reports the reason on every call, so one bad
/// entry cannot keep the others out of an ensemble.
pub fn build_backend(config: &BackendConfig) -> Arc<dyn Backend> {
    if config.model.trim().is_empty() {
        return Arc::new(UnavailableBackend::new(config, "no model configured"));
    }

    let built: Result<Arc<dyn Backend>, BackendError> = match config.provider {
        Provider::OpenAi => {
            OpenAiBackend::new(config.clone()).map(|b| Arc::new(b) as Arc<dyn Backend>)
        }
        Provider::Anthropic => {
            AnthropicBackend::new(config.clone()).map(|b| Arc::new(b) as Arc<dyn Backend>)
        }
        Provider::Gemini => {
            GeminiBackend::new(config.clone()).map(|b| Arc::new(b) as Arc<dyn Backend>)
        }
        Provider::Scripted => Err(BackendError::configuration(
            &config.id,
            "scripted backends can only be created in-process",
        )),
    };

    match built {
        Ok(backend) => {
            tracing::debug!(
                backend = %config.id,
                provider = %config.provider,
                model = %config.model,
                "backend ready"
            );
            backend
        }
        Err(e) => {
            tracing::warn!(backend = %config.id, error = %e, "backend unavailable");
            Arc::new(UnavailableBackend::new(config, e.to_string()))
        }
    }
}

/// Stand-in for a backend that could not be built.
#[derive(Debug, Clone)]
pub struct UnavailableBackend {
    id: String,
    provider: Provider,
    model: String,
    reason: String,
}

impl UnavailableBackend {
    pub fn new(config: &BackendConfig, reason: impl Into<String>) -> Self {
        Self {
            id: config.id.clone(),
            provider: config.provider,
            model: config.model.clone(),
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

#[async_trait]
impl Backend for UnavailableBackend {
    fn id(&self) -> &str {
        &self.id
    }

    fn provider(&self) -> Provider {
        self.provider
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(1)
    }

    async fn generate(&self, _instruction: &str, _context: &str) -> Result<String, BackendError> {
        Err(BackendError::configuration(&self.id, self.reason.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_each_provider() {
        for (provider, model) in [
            (Provider::OpenAi, "gpt-5"),
            (Provider::Anthropic, "claude-opus-4-20250514"),
            (Provider::Gemini, "gemini-2.5-pro"),
        ] {
            let config = BackendConfig::new(provider.as_str(), provider, model);
            let backend = build_backend(&config);
            assert_eq!(backend.id(), provider.as_str());
            assert_eq!(backend.provider(), provider);
            assert_eq!(backend.model(), model);
        }
    }

    #[tokio::test]
    async fn test_blank_model_is_unavailable() {
        let config = BackendConfig::new("broken", Provider::OpenAi, " ");
        let backend = build_backend(&config);
        let err = backend.generate("i", "c").await.unwrap_err();
        assert!(matches!(err, BackendError::Configuration { .. }));
        assert!(err.to_string().contains("no model configured"));
    }

    #[tokio::test]
    async fn test_scripted_from_config_is_unavailable() {
        let config = BackendConfig::new("canned", Provider::Scripted, "canned");
        let backend = build_backend(&config);
        let err = backend.generate("i", "c").await.unwrap_err();
        assert_eq!(err.backend(), "canned");
        assert_eq!(err.kind(), "configuration_error");
    }

    #[test]
    fn test_unavailable_keeps_identity() {
        let config = BackendConfig::new("x", Provider::Gemini, "gemini-2.0-flash");
        let backend = UnavailableBackend::new(&config, "bad key");
        assert_eq!(backend.id(), "x");
        assert_eq!(backend.provider(), Provider::Gemini);
        assert_eq!(backend.reason(), "bad key");
    }
}
