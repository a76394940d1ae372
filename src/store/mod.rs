//! Persistence gateway for finalized assessments.
//!
//! The conversation orchestrator only ever calls [`AssessmentStore::save`];
//! `get` and `list` back the read-only HTTP listing routes.

mod memory;
mod sqlite;

use async_trait::async_trait;
use triage_common::{Assessment, AssessmentPage, AssessmentQuery};
use uuid::Uuid;

use crate::errors::StoreError;

pub use memory::MemoryStore;
pub use sqlite::{DbHandle, SqliteStore};

/// Durable storage for assessments.
#[async_trait]
pub trait AssessmentStore: Send + Sync {
    /// Insert a new record. Every call creates a record; there is no upsert.
    async fn save(&self, assessment: &Assessment) -> Result<(), StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Assessment>, StoreError>;

    /// Filtered page of records, newest first.
    async fn list(&self, query: &AssessmentQuery) -> Result<AssessmentPage, StoreError>;
}
