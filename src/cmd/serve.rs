//! HTTP service command: `triage serve`.

use std::sync::Arc;

use anyhow::{Context, Result};
use triage::config::{StorageKind, TriageToml};
use triage::conversation::TurnOrchestrator;
use triage::server::{self, AppState, ServerConfig};
use triage::store::{AssessmentStore, MemoryStore, SqliteStore};
use triage::verify::VerificationEnsemble;

pub async fn cmd_serve(
    config: TriageToml,
    host: Option<String>,
    port: Option<u16>,
    offline: bool,
) -> Result<()> {
    for warning in config.validate() {
        tracing::warn!("{}", warning);
    }

    let store = open_store(&config)?;
    let orchestrator =
        TurnOrchestrator::new(super::conversation_backend(&config, offline), store.clone());
    let ensemble = VerificationEnsemble::new(super::verification_backends(&config, offline));

    tracing::info!(
        conversation = %orchestrator.backend().id(),
        verifiers = ?ensemble.backend_ids(),
        storage = %config.storage.backend,
        offline,
        "starting triage service"
    );

    let state = Arc::new(AppState {
        orchestrator,
        ensemble,
        store,
    });

    let server_config = ServerConfig {
        host: host.unwrap_or(config.server.host),
        port: port.unwrap_or(config.server.port),
        cors: config.server.cors,
    };

    server::start_server(server_config, state).await
}

/// Open the configured assessment store.
pub(crate) fn open_store(config: &TriageToml) -> Result<Arc<dyn AssessmentStore>> {
    Ok(match config.storage.backend {
        StorageKind::Memory => Arc::new(MemoryStore::new()),
        StorageKind::Sqlite => Arc::new(SqliteStore::open(&config.storage.path).with_context(
            || format!("Failed to open database {}", config.storage.path.display()),
        )?),
    })
}
