use std::sync::Mutex;

use async_trait::async_trait;
use triage_common::{Assessment, AssessmentPage, AssessmentQuery};
use uuid::Uuid;

use super::AssessmentStore;
use crate::errors::StoreError;

/// Process-local [`AssessmentStore`]. Contents are lost on exit.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Vec<Assessment>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every stored record, in insertion order.
    pub fn all(&self) -> Vec<Assessment> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl AssessmentStore for MemoryStore {
    async fn save(&self, assessment: &Assessment) -> Result<(), StoreError> {
        let mut records = self.records.lock().map_err(|_| StoreError::LockPoisoned)?;
        records.push(assessment.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Assessment>, StoreError> {
        let records = self.records.lock().map_err(|_| StoreError::LockPoisoned)?;
        Ok(records.iter().find(|a| a.id == id).cloned())
    }

    async fn list(&self, query: &AssessmentQuery) -> Result<AssessmentPage, StoreError> {
        let records = self.records.lock().map_err(|_| StoreError::LockPoisoned)?;
        let mut matching: Vec<Assessment> =
            records.iter().filter(|a| query.matches(a)).cloned().collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matching.len() as u64;
        let page = matching
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.limit() as usize)
            .collect();
        Ok(AssessmentPage::new(page, query, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use triage_common::{Analysis, Transcript};

    fn assessment(user: Option<&str>) -> Assessment {
        Assessment::new(
            user.map(String::from),
            Transcript::new(),
            Analysis {
                summary: "s".into(),
                suggested_causes: vec![],
                treatment_plans: vec![],
            },
        )
    }

    #[tokio::test]
    async fn test_save_get_list() {
        let store = MemoryStore::new();
        let a = assessment(Some("u1"));
        store.save(&a).await.unwrap();
        store.save(&assessment(Some("u2"))).await.unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.get(a.id).await.unwrap(), Some(a));
        let page = store.list(&AssessmentQuery::for_user("u1")).await.unwrap();
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn test_list_past_last_page_is_empty() {
        let store = MemoryStore::new();
        store.save(&assessment(None)).await.unwrap();
        let query = AssessmentQuery {
            page: Some(5),
            ..AssessmentQuery::default()
        };
        let page = store.list(&query).await.unwrap();
        assert!(page.assessments.is_empty());
        assert_eq!(page.total, 1);
        assert_eq!(page.pages, 1);
    }
}
