//! Conversation orchestrator: one stateless transition per call.
//!
//! The caller resupplies the full transcript every turn. The orchestrator
//! derives the phase, invokes the conversation backend, validates the reply
//! against the phase's contract and, when the reply is a final analysis,
//! stores an assessment. Storage is best-effort: its failure is logged and
//! reported in [`TurnOutcome::persistence`], never returned as an error.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use triage_common::{Assessment, ModelResponse, Transcript};
use uuid::Uuid;

use crate::backend::{self, Backend};
use crate::contract;
use crate::errors::TurnError;
use crate::phase::Phase;
use crate::store::AssessmentStore;

/// Context sent with the opening turn, when there is no history to send.
const EMPTY_HISTORY_CONTEXT: &str = "The user has not described any symptoms yet.";

/// Input to one conversation turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnRequest {
    #[serde(alias = "history")]
    pub transcript: Transcript,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl TurnRequest {
    pub fn new(transcript: Transcript) -> Self {
        Self {
            transcript,
            user_id: None,
        }
    }

    pub fn with_user_id(mut self, user_id: &str) -> Self {
        self.user_id = Some(user_id.to_string());
        self
    }
}

/// What happened to the assessment record for this turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistenceStatus {
    /// The reply was a question; nothing to store.
    NotApplicable,
    Saved(Uuid),
    /// Storage failed; the reply is still valid.
    Failed(String),
}

/// Result of a successful turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    pub phase: Phase,
    pub response: ModelResponse,
    pub persistence: PersistenceStatus,
}

/// Drives single conversation turns against one backend.
#[derive(Clone)]
pub struct TurnOrchestrator {
    backend: Arc<dyn Backend>,
    store: Arc<dyn AssessmentStore>,
}

impl TurnOrchestrator {
    pub fn new(backend: Arc<dyn Backend>, store: Arc<dyn AssessmentStore>) -> Self {
        Self { backend, store }
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// Run one turn.
    pub async fn take_turn(&self, request: TurnRequest) -> Result<TurnOutcome, TurnError> {
        let TurnRequest {
            transcript,
            user_id,
        } = request;

        let phase = Phase::for_transcript(&transcript);
        let instruction = phase.instruction(&transcript);
        let context = conversation_context(&transcript);

        tracing::debug!(phase = %phase, exchanges = transcript.len(), "starting turn");

        let raw = backend::invoke(self.backend.as_ref(), &instruction, &context).await?;

        let response = contract::parse_and_validate(&raw, phase).inspect_err(|e| {
            tracing::warn!(phase = %phase, kind = e.kind(), error = %e, "reply rejected");
        })?;

        let persistence = match response.as_analysis() {
            Some(analysis) => {
                let assessment = Assessment::new(user_id, transcript, analysis.clone());
                self.persist(&assessment).await
            }
            None => PersistenceStatus::NotApplicable,
        };

        tracing::info!(
            phase = %phase,
            is_final = response.is_final(),
            "turn complete"
        );

        Ok(TurnOutcome {
            phase,
            response,
            persistence,
        })
    }

    async fn persist(&self, assessment: &Assessment) -> PersistenceStatus {
        match self.store.save(assessment).await {
            Ok(()) => {
                tracing::info!(assessment_id = %assessment.id, "assessment saved");
                PersistenceStatus::Saved(assessment.id)
            }
            Err(e) => {
                tracing::warn!(
                    assessment_id = %assessment.id,
                    error = %e,
                    "failed to save assessment; returning analysis anyway"
                );
                PersistenceStatus::Failed(e.to_string())
            }
        }
    }
}

/// User-turn payload for the backend: the rendered history.
fn conversation_context(transcript: &Transcript) -> String {
    if transcript.is_empty() {
        EMPTY_HISTORY_CONTEXT.to_string()
    } else {
        transcript.render()
    }
}
