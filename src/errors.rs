//! Typed error hierarchy for the triage service.
//!
//! Four enums cover the subsystems:
//! - `BackendError`: a single generative backend call
//! - `ContractError`: a reply that does not honour the turn's output contract
//! - `TurnError`: a failed conversation turn (wraps the two above)
//! - `StoreError`: assessment persistence

use std::time::Duration;

use thiserror::Error;

use crate::phase::Phase;

/// Errors from invoking one generative backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Backend {backend} is not configured: {reason}")]
    Configuration { backend: String, reason: String },

    #[error("Transport error talking to backend {backend}: {message}")]
    Transport { backend: String, message: String },

    #[error("Backend {backend} timed out after {after:?}")]
    Timeout { backend: String, after: Duration },

    #[error("Backend {backend} returned HTTP {status}: {message}")]
    Provider {
        backend: String,
        status: u16,
        message: String,
    },

    #[error("Backend {backend} returned no text")]
    EmptyResponse { backend: String },
}

impl BackendError {
    pub fn configuration(backend: &str, reason: impl Into<String>) -> Self {
        Self::Configuration {
            backend: backend.to_string(),
            reason: reason.into(),
        }
    }

    pub fn transport(backend: &str, message: impl Into<String>) -> Self {
        Self::Transport {
            backend: backend.to_string(),
            message: message.into(),
        }
    }

    /// Identifier of the backend that failed.
    pub fn backend(&self) -> &str {
        match self {
            Self::Configuration { backend, .. }
            | Self::Transport { backend, .. }
            | Self::Timeout { backend, .. }
            | Self::Provider { backend, .. }
            | Self::EmptyResponse { backend } => backend,
        }
    }

    /// Transport problems and timeouts may succeed on a later call.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Timeout { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "configuration_error",
            Self::Transport { .. } => "transport_error",
            Self::Timeout { .. } => "timeout",
            Self::Provider { .. } => "backend_error",
            Self::EmptyResponse { .. } => "empty_response",
        }
    }
}

/// Errors from checking a raw reply against the phase's output contract.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContractError {
    #[error("Reply is not a valid JSON document: {reason}")]
    MalformedDocument { reason: String },

    #[error("Reply does not match the expected schema: {reason}")]
    SchemaMismatch { reason: String },

    #[error("Reply has is_final={is_final}, which the {phase} phase does not allow")]
    TerminalityMismatch { phase: Phase, is_final: bool },
}

impl ContractError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedDocument {
            reason: reason.into(),
        }
    }

    pub fn schema(reason: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            reason: reason.into(),
        }
    }

    /// Parseable but wrong: bad shape or wrong terminality.
    pub fn is_contract_violation(&self) -> bool {
        !matches!(self, Self::MalformedDocument { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedDocument { .. } => "malformed_document",
            Self::SchemaMismatch { .. } | Self::TerminalityMismatch { .. } => {
                "contract_violation"
            }
        }
    }
}

/// Errors from one conversation turn.
#[derive(Debug, Error)]
pub enum TurnError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Contract(#[from] ContractError),
}

impl TurnError {
    /// Stable snake_case label for error bodies and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Backend(e) => e.kind(),
            Self::Contract(e) => e.kind(),
        }
    }
}

/// Errors from the assessment store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Failed to (de)serialize assessment: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Stored value is invalid: {0}")]
    InvalidRecord(String),

    #[error("Store lock poisoned")]
    LockPoisoned,

    #[error("Store task failed: {0}")]
    Task(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_error_configuration_carries_backend() {
        let err = BackendError::configuration("openai", "OPENAI_API_KEY not set");
        assert_eq!(err.backend(), "openai");
        assert_eq!(err.kind(), "configuration_error");
        assert!(!err.is_recoverable());
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn backend_error_timeout_is_recoverable() {
        let err = BackendError::Timeout {
            backend: "gemini".into(),
            after: Duration::from_secs(30),
        };
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("30"));
    }

    #[test]
    fn backend_error_provider_carries_status() {
        let err = BackendError::Provider {
            backend: "anthropic".into(),
            status: 401,
            message: "invalid x-api-key".into(),
        };
        match &err {
            BackendError::Provider { status, .. } => assert_eq!(*status, 401),
            _ => panic!("Expected Provider"),
        }
        assert_eq!(err.kind(), "backend_error");
    }

    #[test]
    fn contract_error_malformed_is_not_a_violation() {
        let err = ContractError::malformed("expected value at line 1");
        assert!(!err.is_contract_violation());
        assert_eq!(err.kind(), "malformed_document");
    }

    #[test]
    fn contract_error_terminality_message_names_phase() {
        let err = ContractError::TerminalityMismatch {
            phase: Phase::ForcedFinal,
            is_final: false,
        };
        assert!(err.is_contract_violation());
        let msg = err.to_string();
        assert!(msg.contains("forced_final"));
        assert!(msg.contains("is_final=false"));
    }

    #[test]
    fn turn_error_converts_from_backend_error() {
        let inner = BackendError::transport("openai", "connection refused");
        let turn_err: TurnError = inner.into();
        match &turn_err {
            TurnError::Backend(BackendError::Transport { message, .. }) => {
                assert_eq!(message, "connection refused");
            }
            _ => panic!("Expected TurnError::Backend(Transport(..))"),
        }
        assert_eq!(turn_err.kind(), "transport_error");
    }

    #[test]
    fn turn_error_converts_from_contract_error() {
        let turn_err: TurnError = ContractError::schema("missing options").into();
        assert_eq!(turn_err.kind(), "contract_violation");
    }

    #[test]
    fn all_error_types_implement_std_error_trait() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&BackendError::configuration("x", "y"));
        assert_std_error(&ContractError::malformed("x"));
        assert_std_error(&TurnError::from(ContractError::malformed("x")));
        assert_std_error(&StoreError::LockPoisoned);
    }
}
