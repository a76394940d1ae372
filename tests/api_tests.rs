//! HTTP-level tests for the triage service.
//!
//! The router is driven in-process with scripted backends, so every
//! scenario is deterministic and offline.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;
use uuid::Uuid;

use triage::backend::{Backend, ScriptedBackend, ScriptedReply};
use triage::common::{Assessment, AssessmentPage, AssessmentQuery};
use triage::conversation::TurnOrchestrator;
use triage::errors::StoreError;
use triage::server::api::ASSESSMENT_ID_HEADER;
use triage::server::{AppState, build_router};
use triage::store::{AssessmentStore, MemoryStore};
use triage::verify::VerificationEnsemble;

const QUESTION: &str = r#"{"question": "What is your main symptom?", "options": ["Headache", "Fever", "Cough", "Something else"], "is_final": false}"#;
const ANALYSIS: &str = r#"{"summary": "Symptoms are consistent with a tension headache.", "suggested_causes": [{"title": "Tension headache", "description": "Stress and posture"}], "treatment_plans": [{"title": "Rest", "description": "Hydrate, rest, OTC analgesics"}], "is_final": true}"#;

struct BrokenStore;

#[async_trait]
impl AssessmentStore for BrokenStore {
    async fn save(&self, _assessment: &Assessment) -> Result<(), StoreError> {
        Err(StoreError::InvalidRecord("connection refused".into()))
    }

    async fn get(&self, _id: Uuid) -> Result<Option<Assessment>, StoreError> {
        Err(StoreError::InvalidRecord("connection refused".into()))
    }

    async fn list(&self, _query: &AssessmentQuery) -> Result<AssessmentPage, StoreError> {
        Err(StoreError::InvalidRecord("connection refused".into()))
    }
}

fn router_with(
    conversation: Arc<dyn Backend>,
    verifiers: Vec<Arc<dyn Backend>>,
    store: Arc<dyn AssessmentStore>,
) -> Router {
    let state = Arc::new(AppState {
        orchestrator: TurnOrchestrator::new(conversation, store.clone()),
        ensemble: VerificationEnsemble::new(verifiers),
        store,
    });
    build_router(state)
}

fn conversation(reply: &str) -> Arc<dyn Backend> {
    Arc::new(ScriptedBackend::new("conv").repeating(ScriptedReply::text(reply)))
}

fn history(len: usize) -> serde_json::Value {
    serde_json::Value::Array(
        (0..len)
            .map(|i| serde_json::json!({"question": format!("Question {}", i), "answer": "Yes"}))
            .collect(),
    )
}

fn post_json(uri: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_json(resp: axum::response::Response) -> serde_json::Value {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

// =============================================================================
// Conversation turns
// =============================================================================

mod symptom_checker {
    use super::*;

    #[tokio::test]
    async fn test_empty_history_returns_question() {
        let app = router_with(conversation(QUESTION), vec![], Arc::new(MemoryStore::new()));
        let resp = app
            .oneshot(post_json("/api/symptom-checker", &serde_json::json!({"history": []})))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers().get(ASSESSMENT_ID_HEADER).is_none());
        let json = body_json(resp).await;
        assert_eq!(json["is_final"], false);
        let options = json["options"].as_array().unwrap();
        assert!((4..=6).contains(&options.len()));
    }

    #[tokio::test]
    async fn test_ten_exchanges_return_stored_analysis() {
        let store = Arc::new(MemoryStore::new());
        let app = router_with(conversation(ANALYSIS), vec![], store.clone());
        let resp = app
            .oneshot(post_json(
                "/api/symptom-checker",
                &serde_json::json!({"history": history(10), "userId": "patient-1"}),
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let id = resp
            .headers()
            .get(ASSESSMENT_ID_HEADER)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        let json = body_json(resp).await;
        assert_eq!(json["is_final"], true);
        assert_eq!(json["suggested_causes"][0]["title"], "Tension headache");

        let saved = store.all();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].id.to_string(), id);
        assert_eq!(saved[0].user_id.as_deref(), Some("patient-1"));
        assert_eq!(saved[0].transcript.len(), 10);
    }

    #[tokio::test]
    async fn test_question_at_cap_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let app = router_with(conversation(QUESTION), vec![], store.clone());
        let resp = app
            .oneshot(post_json(
                "/api/symptom-checker",
                &serde_json::json!({"history": history(10)}),
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        let json = body_json(resp).await;
        assert_eq!(json["kind"], "contract_violation");
        assert!(json["error"].as_str().unwrap().contains("forced_final"));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_fenced_reply_is_unwrapped() {
        let fenced = "```json\n{\"question\":\"How long?\",\"options\":[\"a\",\"b\",\"c\",\"d\"],\"is_final\":false}\n```";
        let app = router_with(conversation(fenced), vec![], Arc::new(MemoryStore::new()));
        let resp = app
            .oneshot(post_json("/api/symptom-checker", &serde_json::json!({"history": []})))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(
            json,
            serde_json::json!({"question": "How long?", "options": ["a", "b", "c", "d"], "is_final": false})
        );
    }

    #[tokio::test]
    async fn test_store_failure_still_returns_analysis() {
        let app = router_with(conversation(ANALYSIS), vec![], Arc::new(BrokenStore));
        let resp = app
            .oneshot(post_json(
                "/api/symptom-checker",
                &serde_json::json!({"history": history(10)}),
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers().get(ASSESSMENT_ID_HEADER).is_none());
        let json = body_json(resp).await;
        assert_eq!(json["is_final"], true);
    }

    #[tokio::test]
    async fn test_missing_history_is_400() {
        let app = router_with(conversation(QUESTION), vec![], Arc::new(MemoryStore::new()));
        let resp = app
            .oneshot(post_json("/api/symptom-checker", &serde_json::json!({"userId": "u"})))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let json = body_json(resp).await;
        assert_eq!(json["error"], "Invalid request. 'history' is required.");
    }

    #[tokio::test]
    async fn test_non_json_body_is_400() {
        let app = router_with(conversation(QUESTION), vec![], Arc::new(MemoryStore::new()));
        let req = Request::builder()
            .method("POST")
            .uri("/api/symptom-checker")
            .header("content-type", "application/json")
            .body(Body::from("not json"))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_tracker_alias() {
        let app = router_with(conversation(QUESTION), vec![], Arc::new(MemoryStore::new()));
        let resp = app
            .oneshot(post_json("/api/symptom-tracker", &serde_json::json!({"history": []})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_backend_timeout_is_504() {
        let slow: Arc<dyn Backend> = Arc::new(
            ScriptedBackend::new("conv")
                .repeating(ScriptedReply::text(QUESTION))
                .with_delay(Duration::from_secs(10))
                .with_timeout(Duration::from_millis(50)),
        );
        let app = router_with(slow, vec![], Arc::new(MemoryStore::new()));
        let resp = app
            .oneshot(post_json("/api/symptom-checker", &serde_json::json!({"history": []})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(body_json(resp).await["kind"], "timeout");
    }

    #[tokio::test]
    async fn test_missing_credential_is_500() {
        let unconfigured: Arc<dyn Backend> = Arc::new(
            ScriptedBackend::new("conv")
                .repeating(ScriptedReply::configuration("GEMINI_API_KEY not configured")),
        );
        let app = router_with(unconfigured, vec![], Arc::new(MemoryStore::new()));
        let resp = app
            .oneshot(post_json("/api/symptom-checker", &serde_json::json!({"history": []})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(resp).await["kind"], "configuration_error");
    }
}

// =============================================================================
// Verification
// =============================================================================

mod verification {
    use super::*;

    fn request_body() -> serde_json::Value {
        serde_json::json!({
            "symptoms": history(3),
            "analysis": {
                "summary": "Tension headache",
                "suggested_causes": [{"title": "Stress", "description": "Work pressure"}],
                "treatment_plans": [{"title": "Rest", "description": "Sleep and hydrate"}]
            },
            "patient_context": {"age": 41}
        })
    }

    fn verifier(id: &str, reply: ScriptedReply) -> Arc<dyn Backend> {
        Arc::new(ScriptedBackend::new(id).repeating(reply))
    }

    #[tokio::test]
    async fn test_one_invalid_credential_gives_partial_report() {
        let app = router_with(
            conversation(QUESTION),
            vec![
                verifier("openai", ScriptedReply::text("Confidence: 8\nJustification: Thorough.")),
                verifier("anthropic", ScriptedReply::provider(401, "invalid x-api-key")),
                verifier("gemini", ScriptedReply::text("Confidence: 6\nJustification: Adequate.")),
            ],
            Arc::new(MemoryStore::new()),
        );
        let resp = app.oneshot(post_json("/api/verify", &request_body())).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        let outcomes = json["outcomes"].as_array().unwrap();
        assert_eq!(outcomes.len(), 3);

        let errors: Vec<_> = outcomes.iter().filter(|o| o.get("error").is_some()).collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0]["backend_id"], "anthropic");
        assert!(errors[0]["error"].as_str().unwrap().contains("401"));

        for outcome in outcomes.iter().filter(|o| o.get("error").is_none()) {
            let confidence = outcome["confidence"].as_u64().unwrap();
            assert!(confidence <= 10);
        }
        assert_eq!(json["succeeded"], 2);
        assert_eq!(json["failed"], 1);
    }

    #[tokio::test]
    async fn test_all_backends_failing_is_still_200() {
        let app = router_with(
            conversation(QUESTION),
            vec![
                verifier("a", ScriptedReply::transport("connection reset")),
                verifier("b", ScriptedReply::configuration("missing key")),
            ],
            Arc::new(MemoryStore::new()),
        );
        let resp = app.oneshot(post_json("/api/verify", &request_body())).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["failed"], 2);
    }

    #[tokio::test]
    async fn test_invalid_request_is_400() {
        let app = router_with(conversation(QUESTION), vec![], Arc::new(MemoryStore::new()));
        let resp = app
            .oneshot(post_json("/api/verify", &serde_json::json!({"symptoms": []})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}

// =============================================================================
// Assessment listing
// =============================================================================

mod assessments {
    use super::*;
    use triage::common::{Analysis, Transcript};

    async fn seeded_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        for user in ["alice", "alice", "bob"] {
            let assessment = Assessment::new(
                Some(user.to_string()),
                Transcript::new().with_exchange("q", "a"),
                Analysis {
                    summary: format!("summary for {}", user),
                    suggested_causes: vec![],
                    treatment_plans: vec![],
                },
            );
            store.save(&assessment).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_list_filters_by_user() {
        let store = seeded_store().await;
        let app = router_with(conversation(QUESTION), vec![], store);
        let resp = app.oneshot(get("/api/assessments?userId=alice")).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["total"], 2);
        assert_eq!(json["page"], 1);
        assert_eq!(json["limit"], 20);
    }

    #[tokio::test]
    async fn test_list_paginates() {
        let store = seeded_store().await;
        let app = router_with(conversation(QUESTION), vec![], store);
        let resp = app.oneshot(get("/api/assessments?page=2&limit=2")).await.unwrap();
        let json = body_json(resp).await;
        assert_eq!(json["assessments"].as_array().unwrap().len(), 1);
        assert_eq!(json["pages"], 2);
    }

    #[tokio::test]
    async fn test_list_accepts_date_only_bounds() {
        let store = seeded_store().await;
        let app = router_with(conversation(QUESTION), vec![], store.clone());
        let resp = app
            .oneshot(get("/api/assessments?startDate=2000-01-01&endDate=2999-12-31"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["total"], 3);

        let app = router_with(conversation(QUESTION), vec![], store);
        let resp = app.oneshot(get("/api/assessments?startDate=2999-01-01")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["total"], 0);
    }

    #[tokio::test]
    async fn test_list_bad_query_is_400() {
        let app = router_with(conversation(QUESTION), vec![], Arc::new(MemoryStore::new()));
        let resp = app.oneshot(get("/api/assessments?page=first")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_get_by_id() {
        let store = seeded_store().await;
        let id = store.all()[0].id;
        let app = router_with(conversation(QUESTION), vec![], store);
        let resp = app
            .oneshot(get(&format!("/api/assessments/{}", id)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["id"], id.to_string());
        assert_eq!(json["userId"], "alice");
    }

    #[tokio::test]
    async fn test_get_unknown_is_404() {
        let app = router_with(conversation(QUESTION), vec![], Arc::new(MemoryStore::new()));
        let resp = app
            .oneshot(get(&format!("/api/assessments/{}", Uuid::new_v4())))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_get_malformed_id_is_400() {
        let app = router_with(conversation(QUESTION), vec![], Arc::new(MemoryStore::new()));
        let resp = app.oneshot(get("/api/assessments/not-a-uuid")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_store_failure_is_500() {
        let app = router_with(conversation(QUESTION), vec![], Arc::new(BrokenStore));
        let resp = app.oneshot(get("/api/assessments")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
