//! Best-effort parsing of structured LLM completions
//!
//! Methods that ask the model for JSON must survive malformed output, so
//! every parse here degrades to a lexical fallback instead of erroring, and
//! callers can observe which path produced the values.

use serde_json::Value;

/// How a best-effort parse produced its values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseSource {
    /// The completion was valid JSON of the expected shape
    Json,
    /// The structured parse failed and a lexical fallback was applied
    Fallback,
}

/// Values extracted from a keyed JSON object, padded or truncated to a
/// fixed length
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyedValues {
    pub values: Vec<String>,
    pub source: ParseSource,
}

/// Indices a refine stage kept
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeptIndices {
    pub indices: Vec<usize>,
    pub source: ParseSource,
}

/// Strip markdown fences and parse a JSON object from a completion.
fn parse_json_object(raw: &str) -> Option<serde_json::Map<String, Value>> {
    let mut text = raw.trim().to_string();
    if text.contains("```") {
        let parts: Vec<&str> = text.split("```").collect();
        if parts.len() >= 2 {
            let inner = parts[1];
            let inner = inner.strip_prefix("json").unwrap_or(inner);
            text = inner.trim().to_string();
        }
    }
    match serde_json::from_str::<Value>(&text) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Extract `prefix1..prefixN` values from a JSON completion, falling back
/// to line-splitting with bullet markers stripped. The result always has
/// exactly `n` values; missing entries become empty strings.
pub fn keyed_values(raw: &str, n: usize, prefix: &str) -> KeyedValues {
    if let Some(map) = parse_json_object(raw) {
        let values = (1..=n)
            .map(|i| {
                map.get(&format!("{prefix}{i}"))
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string()
            })
            .collect();
        return KeyedValues {
            values,
            source: ParseSource::Json,
        };
    }

    let mut values: Vec<String> = raw
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            line.trim_matches(|c: char| matches!(c, '-' | '•' | '*' | ' ' | '\t'))
                .to_string()
        })
        .collect();
    values.resize(n, String::new());
    KeyedValues {
        values,
        source: ParseSource::Fallback,
    }
}

/// Indices `0..n` whose `prefix{i+1}` key is present with a non-empty
/// string value. Parse failure keeps every index: discarding answers over a
/// malformed verdict would lose signal.
pub fn kept_indices(raw: &str, n: usize, prefix: &str) -> KeptIndices {
    if let Some(map) = parse_json_object(raw) {
        let indices = (0..n)
            .filter(|i| {
                map.get(&format!("{prefix}{}", i + 1))
                    .and_then(Value::as_str)
                    .map(|s| !s.trim().is_empty())
                    .unwrap_or(false)
            })
            .collect();
        return KeptIndices {
            indices,
            source: ParseSource::Json,
        };
    }
    KeptIndices {
        indices: (0..n).collect(),
        source: ParseSource::Fallback,
    }
}
