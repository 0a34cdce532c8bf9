//! Turning model text into structured payloads, and reading them back.
//!
//! Model output is unreliable: it may wrap JSON in a fenced block, stop
//! mid-object, or not be JSON at all. [`parse_content`] never fails; text it
//! cannot recover comes back as `{"raw": text}`.

use serde_json::{Map, Value};

/// Key used to wrap unparseable model text.
pub const RAW_KEY: &str = "raw";

/// Placeholder for text fields the model left out.
pub const NOT_AVAILABLE: &str = "N/A";

/// Extract a JSON payload from model text.
pub fn parse_content(text: &str) -> Value {
    let candidate = fenced_json(text).unwrap_or(text).trim();

    if let Ok(value) = serde_json::from_str::<Value>(candidate) {
        return value;
    }

    let repaired = repair_truncated(candidate).and_then(|fixed| serde_json::from_str(&fixed).ok());
    if let Some(value) = repaired {
        return value;
    }

    let mut wrapper = Map::new();
    wrapper.insert(RAW_KEY.to_string(), Value::String(text.to_string()));
    Value::Object(wrapper)
}

/// True when the payload is the raw-text wrapper produced by [`parse_content`].
pub fn is_raw(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|obj| obj.len() == 1 && obj.get(RAW_KEY).is_some_and(Value::is_string))
}

/// Contents of the first ```json fenced block, if any. An unterminated
/// fence runs to the end of the text.
fn fenced_json(text: &str) -> Option<&str> {
    let start = text.find("```json")? + "```json".len();
    let rest = &text[start..];
    Some(match rest.find("```") {
        Some(end) => &rest[..end],
        None => rest,
    })
}

/// Repair JSON that was cut off mid-stream.
///
/// Keeps everything up to the last closing bracket that ends a complete
/// value, then closes whatever containers are still open.
fn repair_truncated(text: &str) -> Option<String> {
    let start = text.find(['{', '['])?;
    let body = &text[start..];

    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    let mut last_close: Option<(usize, Vec<char>)> = None;

    for (i, c) in body.char_indices() {
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
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                if stack.pop() != Some(c) {
                    break;
                }
                last_close = Some((i, stack.clone()));
                if stack.is_empty() {
                    break;
                }
            }
            _ => {}
        }
    }

    let (end, open) = last_close?;
    let mut repaired = body[..=end].to_string();
    repaired.extend(open.iter().rev());
    Some(repaired)
}

// ============================================================================
// Payload accessors
// ============================================================================

/// A string field, or [`NOT_AVAILABLE`] when missing or empty.
pub fn text_field(value: &Value, key: &str) -> String {
    text_or(value, key, NOT_AVAILABLE)
}

/// A string field, or `default` when missing or empty. Numbers and booleans
/// are rendered as text.
pub fn text_or(value: &Value, key: &str, default: &str) -> String {
    match value.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => default.to_string(),
    }
}

/// A list of strings. A single string is treated as a one-element list;
/// non-string entries are skipped.
pub fn string_list(value: &Value, key: &str) -> Vec<String> {
    match value.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.clone()],
        _ => Vec::new(),
    }
}

/// An array of objects under `key`; anything else yields an empty list.
pub fn object_list<'a>(value: &'a Value, key: &str) -> Vec<&'a Value> {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(|items| items.iter().filter(|item| item.is_object()).collect())
        .unwrap_or_default()
}

/// An integer strength on the 1..=10 scale.
///
/// Accepts numbers and numeric strings; anything unparsable becomes
/// `default`.
pub fn strength_field(value: &Value, key: &str, default: u8) -> u8 {
    let parsed = match value.get(key) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(n) if n.is_finite() => n.round().clamp(1.0, 10.0) as u8,
        _ => default,
    }
}

/// A floating point field, accepting numeric strings.
pub fn number_field(value: &Value, key: &str, default: f64) -> f64 {
    match value.get(key) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(default),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(default),
        _ => default,
    }
}
