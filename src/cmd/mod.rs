//! CLI command implementations.
//!
//! | Module    | Commands handled |
//! |-----------|------------------|
//! | `serve`   | `Serve`          |
//! | `turn`    | `Turn`           |
//! | `verify`  | `Verify`         |
//! | `config`  | `Config`         |

pub mod config;
pub mod serve;
pub mod turn;
pub mod verify;

use std::sync::Arc;

use triage::backend::{Backend, Provider, ScriptedBackend};
use triage::config::TriageToml;

pub use config::cmd_config;
pub use serve::cmd_serve;
pub use turn::cmd_turn;
pub use verify::cmd_verify;

/// Backend for conversation turns, real or canned.
pub(crate) fn conversation_backend(config: &TriageToml, offline: bool) -> Arc<dyn Backend> {
    if offline {
        Arc::new(ScriptedBackend::offline_conversation(&config.conversation.backend))
    } else {
        config.conversation_backend()
    }
}

/// Verifier backends in configured order, real or canned.
pub(crate) fn verification_backends(config: &TriageToml, offline: bool) -> Vec<Arc<dyn Backend>> {
    if !offline {
        return config.verification_backends();
    }
    config
        .verification
        .backends
        .iter()
        .map(|id| {
            let backend = match config.backend(id) {
                Some(b) => ScriptedBackend::offline_verifier(id, b.provider, &b.model),
                None => ScriptedBackend::offline_verifier(id, Provider::Scripted, "offline"),
            };
            Arc::new(backend) as Arc<dyn Backend>
        })
        .collect()
}
