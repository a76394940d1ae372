//! Question/answer history for one triage session.

use serde::{Deserialize, Serialize};

/// One recorded question and the answer the user gave to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exchange {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub answer: String,
}

impl Exchange {
    pub fn new(question: &str, answer: &str) -> Self {
        Self {
            question: question.to_string(),
            answer: answer.to_string(),
        }
    }
}

/// Ordered, chronological list of exchanges.
///
/// The transcript is always supplied by the caller; the service never holds
/// one between requests. Serialized as a bare JSON array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript(Vec<Exchange>);

impl Transcript {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn exchanges(&self) -> &[Exchange] {
        &self.0
    }

    /// Append an exchange and return the new length.
    pub fn push(&mut self, exchange: Exchange) -> usize {
        self.0.push(exchange);
        self.0.len()
    }

    /// Builder-style append, handy when assembling fixtures.
    pub fn with_exchange(mut self, question: &str, answer: &str) -> Self {
        self.0.push(Exchange::new(question, answer));
        self
    }

    /// Render as `Q: ...` / `A: ...` blocks, one exchange after another.
    pub fn render(&self) -> String {
        self.0
            .iter()
            .map(|e| format!("Q: {}\nA: {}", e.question, e.answer))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl From<Vec<Exchange>> for Transcript {
    fn from(exchanges: Vec<Exchange>) -> Self {
        Self(exchanges)
    }
}

impl FromIterator<Exchange> for Transcript {
    fn from_iter<I: IntoIterator<Item = Exchange>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
