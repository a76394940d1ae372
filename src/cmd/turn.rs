//! Single conversation turn from the command line: `triage turn`.

use std::path::Path;

use anyhow::{Context, Result};
use triage::common::Transcript;
use triage::config::TriageToml;
use triage::conversation::{PersistenceStatus, TurnOrchestrator, TurnRequest};

pub async fn cmd_turn(
    config: &TriageToml,
    history: &Path,
    user_id: Option<String>,
    offline: bool,
) -> Result<()> {
    let content = std::fs::read_to_string(history)
        .with_context(|| format!("Failed to read history file: {}", history.display()))?;
    let transcript: Transcript = serde_json::from_str(&content)
        .with_context(|| format!("Invalid transcript JSON in {}", history.display()))?;

    let store = super::serve::open_store(config)?;
    let orchestrator = TurnOrchestrator::new(super::conversation_backend(config, offline), store);

    let outcome = orchestrator
        .take_turn(TurnRequest {
            transcript,
            user_id,
        })
        .await
        .with_context(|| "Conversation turn failed")?;

    match &outcome.persistence {
        PersistenceStatus::Saved(id) => tracing::info!(assessment_id = %id, "assessment stored"),
        PersistenceStatus::Failed(reason) => tracing::warn!(%reason, "assessment not stored"),
        PersistenceStatus::NotApplicable => {}
    }

    println!("{}", serde_json::to_string_pretty(&outcome.response)?);
    Ok(())
}
