//! Conversation phase selection.
//!
//! The phase of a turn is a pure function of how many exchanges the caller
//! has already recorded. There is no server-side counter: resubmitting the
//! same transcript always yields the same phase, and appending exchanges can
//! only move the conversation forward until the cap forces a final analysis.

use serde::{Deserialize, Serialize};
use triage_common::Transcript;

use crate::prompts;

/// Maximum number of question/answer exchanges before a final analysis is forced.
pub const MAX_EXCHANGES: usize = 10;

/// Stage of a conversation, derived from transcript length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// No exchanges yet: ask the opening question.
    Initial,
    /// Some history, budget left: ask again or conclude.
    FollowUp,
    /// Budget exhausted: a final analysis is the only acceptable reply.
    ForcedFinal,
}

/// Map a transcript length to its phase.
///
/// `0` is `Initial`, `1..MAX_EXCHANGES` is `FollowUp`, anything at or past the
/// cap is `ForcedFinal`.
pub fn select_phase(transcript_len: usize) -> Phase {
    match transcript_len {
        0 => Phase::Initial,
        n if n >= MAX_EXCHANGES => Phase::ForcedFinal,
        _ => Phase::FollowUp,
    }
}

impl Phase {
    pub fn for_transcript(transcript: &Transcript) -> Self {
        select_phase(transcript.len())
    }

    /// The `is_final` value a reply must carry in this phase, if constrained.
    pub fn expected_terminality(self) -> Option<bool> {
        match self {
            Phase::Initial => Some(false),
            Phase::FollowUp => None,
            Phase::ForcedFinal => Some(true),
        }
    }

    /// Whether a reply with the given terminality is acceptable in this phase.
    pub fn accepts(self, is_final: bool) -> bool {
        self.expected_terminality()
            .is_none_or(|expected| expected == is_final)
    }

    /// Render the instruction template for this phase.
    pub fn instruction(self, transcript: &Transcript) -> String {
        match self {
            Phase::Initial => prompts::initial_prompt(),
            Phase::FollowUp => prompts::follow_up_prompt(transcript),
            Phase::ForcedFinal => prompts::forced_final_prompt(transcript),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Initial => "initial",
            Phase::FollowUp => "follow_up",
            Phase::ForcedFinal => "forced_final",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
