//! Layered configuration for the triage service.
//!
//! Settings are read from `triage.toml`, then overridden by environment
//! variables, then by CLI flags (applied by the commands themselves).
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 5328
//! cors = false
//!
//! [conversation]
//! backend = "gemini-flash"
//!
//! [verification]
//! backends = ["openai", "anthropic", "gemini"]
//!
//! [storage]
//! backend = "sqlite"
//! path = "triage.db"
//!
//! [logging]
//! format = "pretty"
//!
//! [[backends]]
//! id = "gemini-flash"
//! provider = "gemini"
//! model = "gemini-2.0-flash"
//! timeout_secs = 60
//! ```
//!
//! Provider keys come from `api_key`, `api_key_env`, or the provider's
//! default variable (`OPENAI_API_KEY`, `ANTHROPIC_API_KEY`, `GEMINI_API_KEY`).
//! A missing key is a warning, never a startup failure.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::backend::{self, Backend, BackendConfig, Provider, UnavailableBackend};

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "triage.toml";

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Where assessments are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    Sqlite,
    Memory,
}

impl std::fmt::Display for StorageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageKind::Sqlite => write!(f, "sqlite"),
            StorageKind::Memory => write!(f, "memory"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Permissive CORS for browser front ends on another origin.
    #[serde(default)]
    pub cors: bool,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5328
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSection {
    /// Id of the backend that drives conversation turns.
    #[serde(default = "default_conversation_backend")]
    pub backend: String,
}

fn default_conversation_backend() -> String {
    "gemini-flash".to_string()
}

impl Default for ConversationSection {
    fn default() -> Self {
        Self {
            backend: default_conversation_backend(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationSection {
    /// Ids of the verifier backends, in report order.
    #[serde(default = "default_verification_backends")]
    pub backends: Vec<String>,
}

fn default_verification_backends() -> Vec<String> {
    vec![
        "openai".to_string(),
        "anthropic".to_string(),
        "gemini".to_string(),
    ]
}

impl Default for VerificationSection {
    fn default() -> Self {
        Self {
            backends: default_verification_backends(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageSection {
    #[serde(default)]
    pub backend: StorageKind,
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("triage.db")
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            backend: StorageKind::default(),
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingSection {
    #[serde(default)]
    pub format: LogFormat,
    /// Also write daily-rotated log files here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
}

/// The reference deployment: one fast model for turns, three verifiers.
fn default_backends() -> Vec<BackendConfig> {
    vec![
        BackendConfig::new("gemini-flash", Provider::Gemini, "gemini-2.0-flash"),
        BackendConfig::new("openai", Provider::OpenAi, "gpt-5"),
        BackendConfig::new("anthropic", Provider::Anthropic, "claude-opus-4-20250514"),
        BackendConfig::new("gemini", Provider::Gemini, "gemini-2.5-pro"),
    ]
}

/// Parsed `triage.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriageToml {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub conversation: ConversationSection,
    #[serde(default)]
    pub verification: VerificationSection,
    #[serde(default)]
    pub storage: StorageSection,
    #[serde(default)]
    pub logging: LoggingSection,
    #[serde(default = "default_backends")]
    pub backends: Vec<BackendConfig>,
}

impl Default for TriageToml {
    fn default() -> Self {
        Self {
            server: ServerSection::default(),
            conversation: ConversationSection::default(),
            verification: VerificationSection::default(),
            storage: StorageSection::default(),
            logging: LoggingSection::default(),
            backends: default_backends(),
        }
    }
}

impl TriageToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse triage.toml")
    }

    /// Load the file if it exists, defaults otherwise.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// File, then environment.
    pub fn load_layered(path: &Path) -> Result<Self> {
        let mut config = Self::load_or_default(path)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = self.to_toml()?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize triage.toml")
    }

    /// Apply `TRIAGE_HOST`, `TRIAGE_PORT` and `TRIAGE_DB_PATH`.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from any variable source.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(host) = lookup("TRIAGE_HOST").filter(|h| !h.trim().is_empty()) {
            self.server.host = host.trim().to_string();
        }
        if let Some(port) = lookup("TRIAGE_PORT") {
            self.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("Invalid TRIAGE_PORT '{}'", port))?;
        }
        if let Some(path) = lookup("TRIAGE_DB_PATH").filter(|p| !p.trim().is_empty()) {
            self.storage.path = PathBuf::from(path.trim());
        }
        Ok(())
    }

    pub fn backend(&self, id: &str) -> Option<&BackendConfig> {
        self.backends.iter().find(|b| b.id == id)
    }

    /// Build the backend with this id, or a stand-in that reports why it is missing.
    pub fn build_backend(&self, id: &str) -> Arc<dyn Backend> {
        match self.backend(id) {
            Some(config) => backend::build_backend(config),
            None => {
                tracing::warn!(backend = %id, "referenced backend is not configured");
                let placeholder = BackendConfig::new(id, Provider::Scripted, "");
                Arc::new(UnavailableBackend::new(
                    &placeholder,
                    format!("no backend with id '{}' is configured", id),
                ))
            }
        }
    }

    pub fn conversation_backend(&self) -> Arc<dyn Backend> {
        self.build_backend(&self.conversation.backend)
    }

    pub fn verification_backends(&self) -> Vec<Arc<dyn Backend>> {
        self.verification
            .backends
            .iter()
            .map(|id| self.build_backend(id))
            .collect()
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        let mut seen = HashSet::new();
        for backend in &self.backends {
            if !seen.insert(backend.id.as_str()) {
                warnings.push(format!("Duplicate backend id '{}'", backend.id));
            }
            if backend.model.trim().is_empty() {
                warnings.push(format!("Backend '{}' has no model", backend.id));
            }
            if backend.timeout_secs == 0 {
                warnings.push(format!("Backend '{}' has a zero timeout", backend.id));
            }
            if backend.provider == Provider::Scripted {
                warnings.push(format!(
                    "Backend '{}' uses the scripted provider, which only works with --offline",
                    backend.id
                ));
            } else if backend.resolve_api_key().is_none() {
                warnings.push(format!(
                    "Backend '{}' has no API key ({} not set)",
                    backend.id,
                    backend.key_env().unwrap_or("api_key")
                ));
            }
        }

        if self.backend(&self.conversation.backend).is_none() {
            warnings.push(format!(
                "Conversation backend '{}' is not defined in [[backends]]",
                self.conversation.backend
            ));
        }

        if self.verification.backends.is_empty() {
            warnings.push("No verification backends configured".to_string());
        }
        for id in &self.verification.backends {
            if self.backend(id).is_none() {
                warnings.push(format!(
                    "Verification backend '{}' is not defined in [[backends]]",
                    id
                ));
            }
        }

        warnings
    }
}
