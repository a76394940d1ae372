//! Inputs and outputs of the cross-provider verification ensemble.

use serde::{Deserialize, Serialize};

use crate::response::Analysis;
use crate::transcript::Transcript;

/// Optional patient facts a verifier can take into account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pregnant: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comorbidities: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub medications: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allergies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

/// A completed transcript plus the analysis it produced, submitted for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationRequest {
    #[serde(alias = "symptoms")]
    pub transcript: Transcript,
    pub analysis: Analysis,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_context: Option<PatientContext>,
}

impl VerificationRequest {
    pub fn new(transcript: Transcript, analysis: Analysis) -> Self {
        Self {
            transcript,
            analysis,
            patient_context: None,
        }
    }

    pub fn with_patient_context(mut self, context: PatientContext) -> Self {
        self.patient_context = Some(context);
        self
    }
}

/// What one verifier backend concluded, or why it could not.
///
/// Exactly one of `confidence` or `error` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationOutcome {
    pub backend_id: String,
    pub provider: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub justification: Option<String>,
    #[serde(default)]
    pub emergency: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl VerificationOutcome {
    pub fn scored(
        backend_id: &str,
        provider: &str,
        model: &str,
        confidence: u8,
        justification: &str,
    ) -> Self {
        Self {
            backend_id: backend_id.to_string(),
            provider: provider.to_string(),
            model: model.to_string(),
            confidence: Some(confidence),
            justification: Some(justification.to_string()),
            emergency: false,
            error: None,
            duration_ms: 0,
        }
    }

    pub fn failed(backend_id: &str, provider: &str, model: &str, error: &str) -> Self {
        Self {
            backend_id: backend_id.to_string(),
            provider: provider.to_string(),
            model: model.to_string(),
            confidence: None,
            justification: None,
            emergency: false,
            error: Some(error.to_string()),
            duration_ms: 0,
        }
    }

    pub fn with_emergency(mut self, emergency: bool) -> Self {
        self.emergency = emergency;
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Per-backend outcomes of one ensemble run, in configuration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub outcomes: Vec<VerificationOutcome>,
    pub succeeded: usize,
    pub failed: usize,
    pub duration_ms: u64,
}

impl VerificationReport {
    pub fn new(outcomes: Vec<VerificationOutcome>, duration_ms: u64) -> Self {
        let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
        let failed = outcomes.len() - succeeded;
        Self {
            outcomes,
            succeeded,
            failed,
            duration_ms,
        }
    }

    /// Some backends answered and some did not.
    pub fn is_partial(&self) -> bool {
        self.succeeded > 0 && self.failed > 0
    }

    pub fn outcome_for(&self, backend_id: &str) -> Option<&VerificationOutcome> {
        self.outcomes.iter().find(|o| o.backend_id == backend_id)
    }
}
