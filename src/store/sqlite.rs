use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use triage_common::{Assessment, AssessmentPage, AssessmentQuery};
use uuid::Uuid;

use super::AssessmentStore;
use crate::errors::StoreError;

/// Async-safe handle to the assessment database.
///
/// Wraps `AssessmentDb` behind `Arc<Mutex>` and runs all access on tokio's
/// blocking thread pool via `spawn_blocking`.
#[derive(Clone)]
pub struct DbHandle {
    inner: Arc<std::sync::Mutex<AssessmentDb>>,
}

impl DbHandle {
    pub fn new(db: AssessmentDb) -> Self {
        Self {
            inner: Arc::new(std::sync::Mutex::new(db)),
        }
    }

    /// Run a closure with access to the database on a blocking thread.
    /// All data passed into `f` must be owned (`'static`).
    pub async fn call<F, R>(&self, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&AssessmentDb) -> Result<R, StoreError> + Send + 'static,
        R: Send + 'static,
    {
        let db = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let guard = db.lock().map_err(|_| StoreError::LockPoisoned)?;
            f(&guard)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

pub struct AssessmentDb {
    conn: Connection,
}

/// Fixed-width timestamps so text comparison orders chronologically.
fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl AssessmentDb {
    /// Open (or create) a SQLite database at the given path and run migrations.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::InvalidRecord(format!(
                    "cannot create database directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
        let db = Self {
            conn: Connection::open(path)?,
        };
        db.run_migrations()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let db = Self {
            conn: Connection::open_in_memory()?,
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn run_migrations(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS assessments (
                id TEXT PRIMARY KEY,
                user_id TEXT,
                transcript TEXT NOT NULL,
                analysis TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_assessments_created ON assessments(created_at);
            CREATE INDEX IF NOT EXISTS idx_assessments_user ON assessments(user_id, created_at);
            ",
        )?;
        Ok(())
    }

    pub fn insert_assessment(&self, assessment: &Assessment) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO assessments (id, user_id, transcript, analysis, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                assessment.id.to_string(),
                assessment.user_id,
                serde_json::to_string(&assessment.transcript)?,
                serde_json::to_string(&assessment.analysis)?,
                timestamp(&assessment.created_at),
            ],
        )?;
        Ok(())
    }

    pub fn get_assessment(&self, id: Uuid) -> Result<Option<Assessment>, StoreError> {
        let raw = self
            .conn
            .query_row(
                "SELECT id, user_id, transcript, analysis, created_at
                 FROM assessments WHERE id = ?1",
                params![id.to_string()],
                RawAssessment::from_row,
            )
            .optional()?;
        raw.map(RawAssessment::decode).transpose()
    }

    pub fn list_assessments(&self, query: &AssessmentQuery) -> Result<AssessmentPage, StoreError> {
        let mut clauses = Vec::new();
        let mut values = Vec::new();
        if let Some(ref user) = query.user_id {
            values.push(user.clone());
            clauses.push(format!("user_id = ?{}", values.len()));
        }
        if let Some(start) = query.start {
            values.push(timestamp(&start));
            clauses.push(format!("created_at >= ?{}", values.len()));
        }
        if let Some(end) = query.end {
            values.push(timestamp(&end));
            clauses.push(format!("created_at <= ?{}", values.len()));
        }
        let filter = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };

        let total: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM assessments {}", filter),
            params_from_iter(values.iter()),
            |row| row.get(0),
        )?;

        let sql = format!(
            "SELECT id, user_id, transcript, analysis, created_at
             FROM assessments {} ORDER BY created_at DESC, id LIMIT {} OFFSET {}",
            filter,
            query.limit(),
            query.offset()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), RawAssessment::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        let assessments = rows
            .into_iter()
            .map(RawAssessment::decode)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(AssessmentPage::new(assessments, query, total.max(0) as u64))
    }
}

/// Row as stored, before JSON and timestamp decoding.
struct RawAssessment {
    id: String,
    user_id: Option<String>,
    transcript: String,
    analysis: String,
    created_at: String,
}

impl RawAssessment {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            transcript: row.get(2)?,
            analysis: row.get(3)?,
            created_at: row.get(4)?,
        })
    }

    fn decode(self) -> Result<Assessment, StoreError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| StoreError::InvalidRecord(format!("bad id '{}': {}", self.id, e)))?;
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|e| {
                StoreError::InvalidRecord(format!("bad created_at '{}': {}", self.created_at, e))
            })?
            .with_timezone(&Utc);
        Ok(Assessment {
            id,
            user_id: self.user_id,
            transcript: serde_json::from_str(&self.transcript)?,
            analysis: serde_json::from_str(&self.analysis)?,
            created_at,
        })
    }
}

/// SQLite-backed [`AssessmentStore`].
#[derive(Clone)]
pub struct SqliteStore {
    db: DbHandle,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Ok(Self {
            db: DbHandle::new(AssessmentDb::open(path)?),
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self {
            db: DbHandle::new(AssessmentDb::open_in_memory()?),
        })
    }
}

#[async_trait]
impl AssessmentStore for SqliteStore {
    async fn save(&self, assessment: &Assessment) -> Result<(), StoreError> {
        let assessment = assessment.clone();
        self.db
            .call(move |db| db.insert_assessment(&assessment))
            .await
    }

    async fn get(&self, id: Uuid) -> Result<Option<Assessment>, StoreError> {
        self.db.call(move |db| db.get_assessment(id)).await
    }

    async fn list(&self, query: &AssessmentQuery) -> Result<AssessmentPage, StoreError> {
        let query = query.clone();
        self.db.call(move |db| db.list_assessments(&query)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use triage_common::{Analysis, AnalysisItem, Transcript};

    fn analysis() -> Analysis {
        Analysis {
            summary: "Likely tension headache".into(),
            suggested_causes: vec![AnalysisItem::new("Tension headache", "Stress related")],
            treatment_plans: vec![AnalysisItem::new("Rest", "Hydrate and rest")],
        }
    }

    fn assessment(user: Option<&str>, age_minutes: i64) -> Assessment {
        let mut a = Assessment::new(
            user.map(String::from),
            Transcript::new().with_exchange("Main symptom?", "Headache"),
            analysis(),
        );
        a.created_at -= Duration::minutes(age_minutes);
        a
    }

    // =========================================
    // AssessmentDb tests
    // =========================================

    #[test]
    fn test_insert_and_get_roundtrip() {
        let db = AssessmentDb::open_in_memory().unwrap();
        let a = assessment(Some("user-1"), 0);
        db.insert_assessment(&a).unwrap();

        let loaded = db.get_assessment(a.id).unwrap().unwrap();
        assert_eq!(loaded.id, a.id);
        assert_eq!(loaded.user_id.as_deref(), Some("user-1"));
        assert_eq!(loaded.transcript, a.transcript);
        assert_eq!(loaded.analysis, a.analysis);
        assert_eq!(timestamp(&loaded.created_at), timestamp(&a.created_at));
    }

    #[test]
    fn test_get_missing_is_none() {
        let db = AssessmentDb::open_in_memory().unwrap();
        assert!(db.get_assessment(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn test_same_content_twice_creates_two_records() {
        let db = AssessmentDb::open_in_memory().unwrap();
        let first = assessment(Some("u"), 0);
        let mut second = first.clone();
        second.id = Uuid::new_v4();
        db.insert_assessment(&first).unwrap();
        db.insert_assessment(&second).unwrap();
        let page = db.list_assessments(&AssessmentQuery::default()).unwrap();
        assert_eq!(page.total, 2);
    }

    #[test]
    fn test_list_filters_and_orders_newest_first() {
        let db = AssessmentDb::open_in_memory().unwrap();
        db.insert_assessment(&assessment(Some("a"), 30)).unwrap();
        db.insert_assessment(&assessment(Some("a"), 10)).unwrap();
        db.insert_assessment(&assessment(Some("b"), 20)).unwrap();
        db.insert_assessment(&assessment(None, 5)).unwrap();

        let page = db.list_assessments(&AssessmentQuery::for_user("a")).unwrap();
        assert_eq!(page.total, 2);
        assert!(page.assessments[0].created_at > page.assessments[1].created_at);

        let recent = AssessmentQuery {
            start: Some(Utc::now() - Duration::minutes(15)),
            ..AssessmentQuery::default()
        };
        assert_eq!(db.list_assessments(&recent).unwrap().total, 2);

        let older = AssessmentQuery {
            end: Some(Utc::now() - Duration::minutes(15)),
            ..AssessmentQuery::default()
        };
        assert_eq!(db.list_assessments(&older).unwrap().total, 2);
    }

    #[test]
    fn test_list_paginates() {
        let db = AssessmentDb::open_in_memory().unwrap();
        for i in 0..5 {
            db.insert_assessment(&assessment(None, i)).unwrap();
        }
        let query = AssessmentQuery {
            page: Some(2),
            limit: Some(2),
            ..AssessmentQuery::default()
        };
        let page = db.list_assessments(&query).unwrap();
        assert_eq!(page.assessments.len(), 2);
        assert_eq!(page.total, 5);
        assert_eq!(page.pages, 3);
        assert_eq!(page.page, 2);
    }

    #[test]
    fn test_open_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("triage.db");
        AssessmentDb::open(&path).unwrap();
        assert!(path.exists());
    }

    // =========================================
    // SqliteStore tests
    // =========================================

    #[tokio::test]
    async fn test_store_save_and_list() {
        let store = SqliteStore::open_in_memory().unwrap();
        let a = assessment(Some("user-9"), 0);
        store.save(&a).await.unwrap();
        assert_eq!(store.get(a.id).await.unwrap().unwrap().id, a.id);
        let page = store.list(&AssessmentQuery::for_user("user-9")).await.unwrap();
        assert_eq!(page.assessments.len(), 1);
    }

    #[tokio::test]
    async fn test_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("triage.db");
        let a = assessment(None, 0);
        {
            let store = SqliteStore::open(&path).unwrap();
            store.save(&a).await.unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert!(store.get(a.id).await.unwrap().is_some());
    }
}
