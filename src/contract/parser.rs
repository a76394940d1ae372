//! Fence stripping, JSON extraction and per-phase schema validation.

use serde_json::{Map, Value};
use triage_common::{Analysis, AnalysisItem, ModelResponse, Question};

use crate::errors::ContractError;
use crate::phase::Phase;

/// Fewest answer options a question may offer.
pub const MIN_OPTIONS: usize = 4;
/// Most answer options a question may offer.
pub const MAX_OPTIONS: usize = 6;

/// Remove surrounding whitespace and one enclosing markdown code fence.
///
/// Handles ```` ```json ```` (any case) and bare ```` ``` ```` openers. Text
/// without a fence is returned trimmed.
pub fn strip_fences(raw: &str) -> &str {
    let mut text = raw.trim();

    if let Some(rest) = text.strip_prefix("```") {
        // Drop an optional language tag on the opening line
        let rest = match rest.get(..4) {
            Some(tag) if tag.eq_ignore_ascii_case("json") => &rest[4..],
            _ => rest,
        };
        text = rest.trim_start();
    }

    if let Some(rest) = text.strip_suffix("```") {
        text = rest.trim_end();
    }

    text
}

/// Find the first balanced `{...}` span in free text.
///
/// Braces inside JSON strings are ignored.
pub fn extract_json_object(text: &str) -> Option<&str> {
    object_candidates(text).next()
}

/// Every balanced `{...}` span, ordered by its opening brace.
fn object_candidates(text: &str) -> impl Iterator<Item = &str> {
    text.match_indices('{')
        .filter_map(move |(start, _)| balanced_object_at(text, start))
}

fn balanced_object_at(text: &str, start: usize) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }

    None
}

/// Parse a raw reply into a JSON object.
///
/// The fenced or bare reply is tried first; if that fails, the first embedded
/// object that parses wins, so stray braces in surrounding prose are skipped.
pub fn parse_document(raw: &str) -> Result<Map<String, Value>, ContractError> {
    let text = strip_fences(raw);
    if text.is_empty() {
        return Err(ContractError::malformed("reply is empty"));
    }

    let value = match serde_json::from_str::<Value>(text) {
        Ok(value) => value,
        Err(first_err) => object_candidates(text)
            .find_map(|object| serde_json::from_str::<Value>(object).ok())
            .ok_or_else(|| ContractError::malformed(first_err.to_string()))?,
    };

    match value {
        Value::Object(map) => Ok(map),
        other => Err(ContractError::schema(format!(
            "expected a JSON object, got {}",
            json_type_name(&other)
        ))),
    }
}

/// Parse a raw reply and check it against the contract for `phase`.
pub fn parse_and_validate(raw: &str, phase: Phase) -> Result<ModelResponse, ContractError> {
    let document = parse_document(raw)?;

    let is_final = document
        .get("is_final")
        .and_then(Value::as_bool)
        .ok_or_else(|| ContractError::schema("missing boolean `is_final`"))?;

    if !phase.accepts(is_final) {
        return Err(ContractError::TerminalityMismatch { phase, is_final });
    }

    if is_final {
        validate_analysis(&document).map(ModelResponse::Analysis)
    } else {
        validate_question(&document).map(ModelResponse::Question)
    }
}

fn validate_question(document: &Map<String, Value>) -> Result<Question, ContractError> {
    let question = required_text(document, &["question"])?;

    let options = document
        .get("options")
        .ok_or_else(|| ContractError::schema("question is missing `options`"))?
        .as_array()
        .ok_or_else(|| ContractError::schema("`options` must be an array"))?;

    if !(MIN_OPTIONS..=MAX_OPTIONS).contains(&options.len()) {
        return Err(ContractError::schema(format!(
            "`options` must have {}-{} entries, got {}",
            MIN_OPTIONS,
            MAX_OPTIONS,
            options.len()
        )));
    }

    let options = options
        .iter()
        .enumerate()
        .map(|(i, option)| match option.as_str().map(str::trim) {
            Some(text) if !text.is_empty() => Ok(text.to_string()),
            _ => Err(ContractError::schema(format!(
                "option {} must be a non-empty string",
                i
            ))),
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Question { question, options })
}

fn validate_analysis(document: &Map<String, Value>) -> Result<Analysis, ContractError> {
    let summary = required_text(document, &["summary", "analysis"])?;
    let suggested_causes = required_items(document, &["suggested_causes", "causes"])?;
    let treatment_plans = required_items(document, &["treatment_plans", "treatments"])?;

    Ok(Analysis {
        summary,
        suggested_causes,
        treatment_plans,
    })
}

/// First present key among `keys`, which must hold a non-blank string.
fn required_text(document: &Map<String, Value>, keys: &[&str]) -> Result<String, ContractError> {
    let (key, value) = first_present(document, keys)?;
    match value.as_str().map(str::trim) {
        Some(text) if !text.is_empty() => Ok(text.to_string()),
        _ => Err(ContractError::schema(format!(
            "`{}` must be a non-empty string",
            key
        ))),
    }
}

/// First present key among `keys`, which must hold an array of titled items.
fn required_items(
    document: &Map<String, Value>,
    keys: &[&str],
) -> Result<Vec<AnalysisItem>, ContractError> {
    let (key, value) = first_present(document, keys)?;
    let items = value
        .as_array()
        .ok_or_else(|| ContractError::schema(format!("`{}` must be an array", key)))?;

    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            serde_json::from_value::<AnalysisItem>(item.clone()).map_err(|e| {
                ContractError::schema(format!("`{}` entry {} is invalid: {}", key, i, e))
            })
        })
        .collect()
}

fn first_present<'a>(
    document: &'a Map<String, Value>,
    keys: &[&'a str],
) -> Result<(&'a str, &'a Value), ContractError> {
    keys.iter()
        .find_map(|key| document.get(*key).map(|value| (*key, value)))
        .ok_or_else(|| ContractError::schema(format!("missing `{}`", keys[0])))
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
