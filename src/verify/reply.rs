//! Parsing of free-text verifier replies.
//!
//! Verifiers are asked for a `Confidence:` line and a `Justification:` line,
//! but replies drift: markdown emphasis, `7/10`, `[7]`, code fences. The
//! parser accepts those variants and rejects anything without a usable score.

use std::sync::LazyLock;

use regex::Regex;

use crate::contract::strip_fences;

/// Highest score the rubric allows.
pub const MAX_CONFIDENCE: u8 = 10;

/// `Confidence: 7`, `**Confidence:** 7`, `Confidence 7/10`, `Confidence: [7]`,
/// `Confidence level: 8/10`, `Confidence (0-10): 8`.
static CONFIDENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)confidence(?:\s+(?:score|level|rating))?(?:\s*\(\s*0\s*-\s*10\s*\))?",
        r"\s*\**\s*[:=\-]?\s*\**\s*\[?\s*(\d{1,3})\s*\]?(?:\s*/\s*10)?",
    ))
    .unwrap()
});

static JUSTIFICATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)justification\s*\**\s*:?\s*\**\s*(.*)").unwrap());

static EMERGENCY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[\s*#_>]*emergency action\s*\**\s*:").unwrap());

/// Structured reading of one verifier reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifierVerdict {
    pub confidence: u8,
    pub justification: String,
    /// Reply opened with the rubric's emergency marker.
    pub emergency: bool,
}

/// Extract score, justification and the emergency flag from a reply.
pub fn parse_verifier_reply(text: &str) -> Result<VerifierVerdict, String> {
    let body = strip_fences(text);

    let captures = CONFIDENCE_RE
        .captures(body)
        .ok_or_else(|| "verifier reply did not contain a confidence score".to_string())?;
    let (whole, digits) = match (captures.get(0), captures.get(1)) {
        (Some(whole), Some(digits)) => (whole, digits),
        _ => return Err("verifier reply did not contain a confidence score".to_string()),
    };

    let confidence = digits
        .as_str()
        .parse::<u8>()
        .ok()
        .filter(|c| *c <= MAX_CONFIDENCE)
        .ok_or_else(|| {
            format!(
                "verifier confidence {} is outside 0-{}",
                digits.as_str(),
                MAX_CONFIDENCE
            )
        })?;

    let justification = match JUSTIFICATION_RE
        .captures(body)
        .and_then(|c| c.get(1))
    {
        Some(m) => m.as_str().trim().to_string(),
        // Unlabelled: prefer the text after the score, else the text before it
        None => {
            let after = trim_separators(&body[whole.end()..]);
            if after.is_empty() {
                trim_separators(&body[..whole.start()]).to_string()
            } else {
                after.to_string()
            }
        }
    };

    Ok(VerifierVerdict {
        confidence,
        justification,
        emergency: EMERGENCY_RE.is_match(body),
    })
}

/// Strip whitespace and leftover punctuation such as `. ` or `** ` from both ends.
/// A trailing full stop is kept.
fn trim_separators(text: &str) -> &str {
    text.trim_start_matches(|c: char| {
        c.is_whitespace() || matches!(c, '.' | ',' | ';' | ':' | '-' | '*' | ')')
    })
    .trim_end_matches(|c: char| {
        c.is_whitespace() || matches!(c, ',' | ';' | ':' | '-' | '*' | '(')
    })
}
