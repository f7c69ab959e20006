//! Best-effort conversion of a vision-model reply into solution records.
//!
//! The model is asked for a JSON array but routinely wraps it in code fences,
//! adds commentary, or answers in Python-dict syntax. The reply is narrowed to
//! its array span and tried as strict JSON first; only if that fails are the
//! repairs in [`repairs`] applied, in order, before a final parse. A reply that
//! still does not parse yields a single [`SolutionRecord::unrecognized`] record
//! rather than an error.

pub mod repairs;

use serde_json::Value;

use crate::records::SolutionRecord;

/// How a reply was turned into records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// The array span was already valid JSON.
    Strict,
    /// Valid only after text repairs.
    Repaired,
    /// Nothing parseable; records hold the fallback placeholder.
    Unparseable,
}

impl Recovery {
    pub fn as_str(self) -> &'static str {
        match self {
            Recovery::Strict => "strict",
            Recovery::Repaired => "repaired",
            Recovery::Unparseable => "unparseable",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedReply {
    pub records: Vec<SolutionRecord>,
    pub recovery: Recovery,
}

pub fn parse_reply(raw: &str) -> ParsedReply {
    let Some((value, recovery)) = recover_json(raw) else {
        return unparseable();
    };
    let Some(records) = records_from_value(&value) else {
        return unparseable();
    };
    ParsedReply { records, recovery }
}

/// Runs the repair pipeline and returns the first successful parse.
pub fn recover_json(raw: &str) -> Option<(Value, Recovery)> {
    let unfenced = repairs::strip_code_fences(raw);
    let candidate = repairs::slice_array_span(unfenced.trim());
    if candidate.is_empty() {
        return None;
    }

    if let Ok(value) = serde_json::from_str::<Value>(candidate) {
        return Some((value, Recovery::Strict));
    }

    let repaired = repair(candidate);
    serde_json::from_str::<Value>(&repaired)
        .ok()
        .map(|value| (value, Recovery::Repaired))
}

/// Applies the syntax repairs to already-sliced text.
pub fn repair(candidate: &str) -> String {
    let text = repairs::normalize_quotes(candidate);
    let text = repairs::strip_trailing_commas(&text);
    let text = repairs::quote_bare_keys(&text);
    repairs::python_literals_to_json(&text)
}

/// Arrays keep only their object elements, in order. A lone object is taken
/// as a one-element list. Any other JSON value is not a reply.
fn records_from_value(value: &Value) -> Option<Vec<SolutionRecord>> {
    match value {
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(Value::as_object)
                .map(SolutionRecord::from_model_object)
                .collect(),
        ),
        Value::Object(object) => Some(vec![SolutionRecord::from_model_object(object)]),
        _ => None,
    }
}

fn unparseable() -> ParsedReply {
    ParsedReply {
        records: vec![SolutionRecord::unrecognized()],
        recovery: Recovery::Unparseable,
    }
}
