//! Verification ensemble: one rubric, many independent verifiers.
//!
//! Every configured backend audits the same transcript and analysis
//! concurrently. Each backend's result, success or failure, becomes one
//! [`VerificationOutcome`] tagged with that backend's identity. No backend can
//! cancel or block another, and nothing is averaged or voted on.

mod reply;

use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use triage_common::{VerificationOutcome, VerificationReport, VerificationRequest};

use crate::backend::{self, Backend};
use crate::prompts::VERIFIER_RUBRIC;

pub use reply::{MAX_CONFIDENCE, VerifierVerdict, parse_verifier_reply};

/// Runs the verifier rubric against a fixed set of backends.
#[derive(Clone, Default)]
pub struct VerificationEnsemble {
    backends: Vec<Arc<dyn Backend>>,
}

impl VerificationEnsemble {
    pub fn new(backends: Vec<Arc<dyn Backend>>) -> Self {
        Self { backends }
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    pub fn backend_ids(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.id()).collect()
    }

    /// Audit a finished session with every backend and wait for all of them.
    ///
    /// Outcomes come back in backend order. The total wait is bounded by the
    /// slowest backend's own timeout.
    pub async fn verify(&self, request: &VerificationRequest) -> VerificationReport {
        let start = Instant::now();
        let context = context_payload(request);

        tracing::info!(
            backends = self.backends.len(),
            exchanges = request.transcript.len(),
            "starting verification"
        );

        let outcomes = join_all(
            self.backends
                .iter()
                .map(|backend| run_verifier(backend.as_ref(), &context)),
        )
        .await;

        let report = VerificationReport::new(outcomes, start.elapsed().as_millis() as u64);

        if report.failed > 0 {
            tracing::warn!(
                succeeded = report.succeeded,
                failed = report.failed,
                "verification finished with failures"
            );
        } else {
            tracing::info!(succeeded = report.succeeded, "verification finished");
        }

        report
    }
}

/// JSON document sent as context to every verifier.
pub fn context_payload(request: &VerificationRequest) -> String {
    let payload = serde_json::json!({
        "symptoms": request.transcript,
        "analysis": request.analysis,
        "patient_context": request.patient_context,
    });
    serde_json::to_string_pretty(&payload).unwrap_or_else(|_| payload.to_string())
}

async fn run_verifier(backend: &dyn Backend, context: &str) -> VerificationOutcome {
    let start = Instant::now();
    let id = backend.id();
    let provider = backend.provider().to_string();
    let model = backend.model();

    let outcome = match backend::invoke(backend, VERIFIER_RUBRIC, context).await {
        Ok(text) => match parse_verifier_reply(&text) {
            Ok(verdict) => VerificationOutcome::scored(
                id,
                &provider,
                model,
                verdict.confidence,
                &verdict.justification,
            )
            .with_emergency(verdict.emergency),
            Err(reason) => {
                tracing::warn!(backend = %id, %reason, "unusable verifier reply");
                VerificationOutcome::failed(id, &provider, model, &reason)
            }
        },
        Err(e) => VerificationOutcome::failed(id, &provider, model, &e.to_string()),
    };

    outcome.with_duration_ms(start.elapsed().as_millis() as u64)
}
