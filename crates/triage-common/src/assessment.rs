use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::response::Analysis;
use crate::transcript::Transcript;

/// Default page size for assessment listings.
pub const DEFAULT_PAGE_LIMIT: u32 = 20;
/// Upper bound on page size.
pub const MAX_PAGE_LIMIT: u32 = 100;

/// A finalized triage session: the full transcript and the analysis it ended with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assessment {
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub transcript: Transcript,
    pub analysis: Analysis,
    pub created_at: DateTime<Utc>,
}

impl Assessment {
    /// Create a record stamped with a fresh id and the current time.
    pub fn new(user_id: Option<String>, transcript: Transcript, analysis: Analysis) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            transcript,
            analysis,
            created_at: Utc::now(),
        }
    }
}

/// Filter and pagination for listing stored assessments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentQuery {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default, alias = "startDate", deserialize_with = "optional_timestamp")]
    pub start: Option<DateTime<Utc>>,
    #[serde(default, alias = "endDate", deserialize_with = "optional_timestamp")]
    pub end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
}

/// Parse a filter bound: RFC 3339, or a bare `YYYY-MM-DD` meaning midnight UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
        .ok_or_else(|| format!("invalid date '{}': expected YYYY-MM-DD or RFC 3339", raw))
}

fn optional_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer)?
        .map(|raw| parse_timestamp(&raw).map_err(serde::de::Error::custom))
        .transpose()
}

impl AssessmentQuery {
    pub fn for_user(user_id: &str) -> Self {
        Self {
            user_id: Some(user_id.to_string()),
            ..Self::default()
        }
    }

    /// 1-based page number.
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> u32 {
        self.limit
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .clamp(1, MAX_PAGE_LIMIT)
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page() - 1) * u64::from(self.limit())
    }

    /// Whether a record passes the user and date filters.
    pub fn matches(&self, assessment: &Assessment) -> bool {
        if let Some(ref user) = self.user_id
            && assessment.user_id.as_deref() != Some(user.as_str())
        {
            return false;
        }
        if let Some(start) = self.start
            && assessment.created_at < start
        {
            return false;
        }
        if let Some(end) = self.end
            && assessment.created_at > end
        {
            return false;
        }
        true
    }
}

/// One page of assessments, newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentPage {
    pub assessments: Vec<Assessment>,
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub pages: u64,
}

impl AssessmentPage {
    pub fn new(assessments: Vec<Assessment>, query: &AssessmentQuery, total: u64) -> Self {
        let limit = query.limit();
        Self {
            assessments,
            page: query.page(),
            limit,
            total,
            pages: total.div_ceil(u64::from(limit)),
        }
    }
}
