//! In-process backend with canned replies.
//!
//! Used by tests, and by `serve --offline` / `turn --offline` to exercise the
//! whole pipeline without network access.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::{Backend, Provider};
use crate::errors::BackendError;
use crate::phase::MAX_EXCHANGES;

/// One canned outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedReply {
    Text(String),
    Transport(String),
    Provider { status: u16, message: String },
    Configuration(String),
    Empty,
}

impl ScriptedReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    pub fn provider(status: u16, message: impl Into<String>) -> Self {
        Self::Provider {
            status,
            message: message.into(),
        }
    }

    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration(reason.into())
    }

    fn into_result(self, backend: &str) -> Result<String, BackendError> {
        match self {
            Self::Text(text) => Ok(text),
            Self::Transport(message) => Err(BackendError::transport(backend, message)),
            Self::Provider { status, message } => Err(BackendError::Provider {
                backend: backend.to_string(),
                status,
                message,
            }),
            Self::Configuration(reason) => Err(BackendError::configuration(backend, reason)),
            Self::Empty => Err(BackendError::EmptyResponse {
                backend: backend.to_string(),
            }),
        }
    }
}

/// Computes a reply from the instruction and context.
pub type Responder = Arc<dyn Fn(&str, &str) -> ScriptedReply + Send + Sync>;

/// A call the backend received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub instruction: String,
    pub context: String,
}

/// Deterministic backend. Replies come from the queue first, then the
/// responder, then the repeated reply.
pub struct ScriptedBackend {
    id: String,
    provider: Provider,
    model: String,
    timeout: Duration,
    delay: Option<Duration>,
    queue: Mutex<VecDeque<ScriptedReply>>,
    responder: Option<Responder>,
    repeat: Option<ScriptedReply>,
    /// Off for long-lived offline backends so the log cannot grow without bound.
    record_calls: bool,
    calls: Mutex<Vec<RecordedCall>>,
    call_count: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            provider: Provider::Scripted,
            model: "scripted".to_string(),
            timeout: Duration::from_secs(super::DEFAULT_TIMEOUT_SECS),
            delay: None,
            queue: Mutex::new(VecDeque::new()),
            responder: None,
            repeat: None,
            record_calls: true,
            calls: Mutex::new(Vec::new()),
            call_count: AtomicUsize::new(0),
        }
    }

    /// Keep counting calls but stop storing their text.
    pub fn without_call_log(mut self) -> Self {
        self.record_calls = false;
        self
    }

    /// Report a different provider family, e.g. to stand in for a real one.
    pub fn with_provider(mut self, provider: Provider) -> Self {
        self.provider = provider;
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sleep before every reply.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue one reply.
    pub fn with_reply(self, reply: ScriptedReply) -> Self {
        if let Ok(mut queue) = self.queue.lock() {
            queue.push_back(reply);
        }
        self
    }

    pub fn with_replies(self, replies: impl IntoIterator<Item = ScriptedReply>) -> Self {
        if let Ok(mut queue) = self.queue.lock() {
            queue.extend(replies);
        }
        self
    }

    pub fn with_responder(
        mut self,
        responder: impl Fn(&str, &str) -> ScriptedReply + Send + Sync + 'static,
    ) -> Self {
        self.responder = Some(Arc::new(responder));
        self
    }

    /// Reply used once the queue is empty and no responder is set.
    pub fn repeating(mut self, reply: ScriptedReply) -> Self {
        self.repeat = Some(reply);
        self
    }

    /// Conversation stand-in for `--offline`: asks numbered questions until
    /// the history reaches the cap, then returns a canned analysis.
    pub fn offline_conversation(id: &str) -> Self {
        Self::new(id)
            .with_model("offline")
            .without_call_log()
            .with_responder(|_, context| {
                let asked = context.lines().filter(|l| l.starts_with("Q: ")).count();
                let reply = if asked >= MAX_EXCHANGES {
                    serde_json::json!({
                        "summary": "Offline mode: no model was consulted.",
                        "suggested_causes": [
                            {"title": "Not assessed", "description": "Run without --offline for a real analysis."}
                        ],
                        "treatment_plans": [
                            {"title": "Consult a clinician", "description": "Seek professional advice for any concerning symptoms."}
                        ],
                        "is_final": true
                    })
                } else {
                    serde_json::json!({
                        "question": format!("Offline question {}: how would you rate your symptoms?", asked + 1),
                        "options": ["Mild", "Moderate", "Severe", "Something else"],
                        "is_final": false
                    })
                };
                ScriptedReply::Text(reply.to_string())
            })
    }

    /// Verifier stand-in for `--offline`.
    pub fn offline_verifier(id: &str, provider: Provider, model: &str) -> Self {
        Self::new(id)
            .with_provider(provider)
            .with_model(model)
            .without_call_log()
            .repeating(ScriptedReply::text(
                "Confidence: 5\nJustification: Offline verifier; no clinical review was performed.",
            ))
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::Relaxed)
    }

    fn next_reply(&self, instruction: &str, context: &str) -> ScriptedReply {
        let queued = self.queue.lock().ok().and_then(|mut q| q.pop_front());
        queued
            .or_else(|| self.responder.as_ref().map(|r| r(instruction, context)))
            .or_else(|| self.repeat.clone())
            .unwrap_or_else(|| ScriptedReply::transport("no scripted reply left"))
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    fn id(&self) -> &str {
        &self.id
    }

    fn provider(&self) -> Provider {
        self.provider
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn generate(&self, instruction: &str, context: &str) -> Result<String, BackendError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        if self.record_calls
            && let Ok(mut calls) = self.calls.lock()
        {
            calls.push(RecordedCall {
                instruction: instruction.to_string(),
                context: context.to_string(),
            });
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.next_reply(instruction, context).into_result(&self.id)
    }
}
