//! Recovery of a JSON object from free-form model text.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::ExtractionError;

lazy_static! {
    // First `{` to last `}`, across lines.
    static ref GREEDY_OBJECT: Regex = Regex::new(r"(?s)\{.*\}").unwrap();
}

/// Strategy for finding the JSON object in a model answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JsonLocator {
    /// First brace-balanced object that parses, honouring string literals.
    ///
    /// Prose braces before the report are skipped, and braces after it are
    /// never swallowed. Falls back to `Greedy` when no balanced span exists.
    #[default]
    Balanced,

    /// Everything from the first `{` to the last `}`.
    Greedy,
}

impl JsonLocator {
    /// Find and parse the object.
    pub fn parse(self, text: &str) -> Result<Value, ExtractionError> {
        match self {
            JsonLocator::Greedy => parse_greedy(text),
            JsonLocator::Balanced => parse_balanced(text),
        }
    }
}

fn parse_greedy(text: &str) -> Result<Value, ExtractionError> {
    let candidate = GREEDY_OBJECT
        .find(text)
        .ok_or(ExtractionError::NoJson)?
        .as_str();
    Ok(serde_json::from_str(candidate)?)
}

fn parse_balanced(text: &str) -> Result<Value, ExtractionError> {
    let mut first_error = None;
    let mut cursor = 0;

    while let Some(offset) = text[cursor..].find('{') {
        let start = cursor + offset;
        if !opens_object(text, start) {
            cursor = start + 1;
            continue;
        }
        // An unclosed object means a truncated answer; anything after it is nested.
        let Some(end) = balanced_end(text, start) else {
            break;
        };

        match serde_json::from_str::<Value>(&text[start..end]) {
            Ok(value) => return Ok(value),
            Err(e) => {
                debug!("Skipping unparseable span at byte {}: {}", start, e);
                first_error.get_or_insert(e);
            }
        }
        cursor = end;
    }

    match first_error {
        Some(e) => Err(ExtractionError::Parse(e)),
        None => parse_greedy(text),
    }
}

/// Whether the `{` at `start` can begin a JSON object: a key or `}` must follow.
fn opens_object(text: &str, start: usize) -> bool {
    matches!(
        text[start + 1..].trim_start().chars().next(),
        Some('"') | Some('}')
    )
}

/// Byte index just past the `}` closing the object opened at `start`.
fn balanced_end(text: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, b) in text.bytes().enumerate().skip(start) {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }

    None
}
