//! Output contract for conversation turns.
//!
//! A backend reply is free text. Before anything downstream sees it, the
//! reply is unwrapped from any markdown fence, parsed as JSON and checked
//! against the shape the current phase allows:
//!
//! - a question with 4 to 6 answer options and `is_final: false`, or
//! - an analysis with summary, causes and treatment plans and `is_final: true`.
//!
//! Only structure is checked. Nothing here looks at the medical content.

mod parser;

pub use parser::{
    MAX_OPTIONS, MIN_OPTIONS, extract_json_object, parse_and_validate, parse_document,
    strip_fences,
};
