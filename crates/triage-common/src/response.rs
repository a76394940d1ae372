//! The two shapes a conversation turn can produce.
//!
//! A turn either asks another multiple-choice question or delivers the final
//! analysis. On the wire both are flat JSON objects distinguished by the
//! `is_final` flag:
//!
//! ```json
//! {"question": "...", "options": ["..", "..", "..", ".."], "is_final": false}
//! {"summary": "...", "suggested_causes": [..], "treatment_plans": [..], "is_final": true}
//! ```

use serde::{Deserialize, Serialize, Serializer};

/// A follow-up question with its answer options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub question: String,
    pub options: Vec<String>,
}

/// A titled entry in an analysis (a possible cause or a treatment step).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisItem {
    #[serde(alias = "name", alias = "action")]
    pub title: String,
    #[serde(alias = "details")]
    pub description: String,
}

impl AnalysisItem {
    pub fn new(title: &str, description: &str) -> Self {
        Self {
            title: title.to_string(),
            description: description.to_string(),
        }
    }
}

/// Final write-up produced once the conversation terminates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analysis {
    #[serde(alias = "analysis")]
    pub summary: String,
    #[serde(alias = "causes")]
    pub suggested_causes: Vec<AnalysisItem>,
    #[serde(alias = "treatments")]
    pub treatment_plans: Vec<AnalysisItem>,
}

/// Validated model reply for one conversation turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelResponse {
    Question(Question),
    Analysis(Analysis),
}

impl ModelResponse {
    /// Terminality flag, derived from the variant.
    pub fn is_final(&self) -> bool {
        matches!(self, ModelResponse::Analysis(_))
    }

    pub fn as_question(&self) -> Option<&Question> {
        match self {
            ModelResponse::Question(q) => Some(q),
            ModelResponse::Analysis(_) => None,
        }
    }

    pub fn as_analysis(&self) -> Option<&Analysis> {
        match self {
            ModelResponse::Analysis(a) => Some(a),
            ModelResponse::Question(_) => None,
        }
    }
}

impl Serialize for ModelResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Flagged<'a, T: Serialize> {
            #[serde(flatten)]
            body: &'a T,
            is_final: bool,
        }

        match self {
            ModelResponse::Question(q) => Flagged {
                body: q,
                is_final: false,
            }
            .serialize(serializer),
            ModelResponse::Analysis(a) => Flagged {
                body: a,
                is_final: true,
            }
            .serialize(serializer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_question_wire_form_carries_flag() {
        let response = ModelResponse::Question(Question {
            question: "What is your primary symptom?".into(),
            options: vec!["Headache".into(), "Fever".into(), "Cough".into(), "Other".into()],
        });
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["is_final"], json!(false));
        assert_eq!(value["options"].as_array().unwrap().len(), 4);
        assert!(!response.is_final());
    }

    #[test]
    fn test_analysis_wire_form_carries_flag() {
        let response = ModelResponse::Analysis(Analysis {
            summary: "Likely sinusitis".into(),
            suggested_causes: vec![AnalysisItem::new("Sinusitis", "Forehead pressure")],
            treatment_plans: vec![AnalysisItem::new("See a GP", "Symptoms > 1 week")],
        });
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["is_final"], json!(true));
        assert_eq!(value["summary"], json!("Likely sinusitis"));
        assert_eq!(value["suggested_causes"][0]["title"], json!("Sinusitis"));
        assert!(response.is_final());
    }

    #[test]
    fn test_analysis_item_accepts_front_end_spellings() {
        let cause: AnalysisItem =
            serde_json::from_value(json!({"name": "Migraine", "description": "Throbbing"}))
                .unwrap();
        assert_eq!(cause.title, "Migraine");
        let plan: AnalysisItem =
            serde_json::from_value(json!({"action": "Rest", "details": "Dark room"})).unwrap();
        assert_eq!(plan.title, "Rest");
        assert_eq!(plan.description, "Dark room");
    }

    #[test]
    fn test_analysis_accepts_aliases() {
        let analysis: Analysis = serde_json::from_value(json!({
            "analysis": "short",
            "causes": [],
            "treatments": []
        }))
        .unwrap();
        assert_eq!(analysis.summary, "short");
    }
}
