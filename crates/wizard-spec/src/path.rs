//! Dotted-path lookups and `$variable` substitution over JSON values.
//!
//! Substitution only recognises whole-token strings: `"$label"` is replaced,
//! `"Species: $label"` is left as written. Partial interpolation is not
//! supported.

use serde_json::{Map, Value};

/// Splits a dotted path into its non-empty segments.
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('.').filter(|segment| !segment.is_empty())
}

/// Walks `path` through nested objects and arrays.
///
/// Array segments are decimal indexes, optionally bracketed (`0` or `[0]`).
/// Returns `None` when a segment is missing or the container type does not
/// match; an empty path yields `data` itself.
pub fn get<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
    segments(path).try_fold(data, step)
}

fn step<'a>(current: &'a Value, segment: &str) -> Option<&'a Value> {
    match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => parse_index(segment).and_then(|index| items.get(index)),
        _ => None,
    }
}

pub(crate) fn parse_index(segment: &str) -> Option<usize> {
    let raw = segment
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .unwrap_or(segment);
    if raw.is_empty() || !raw.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

/// Returns the variable name when `text` is exactly one `$name` token.
pub fn variable_token(text: &str) -> Option<&str> {
    let name = text.strip_prefix('$')?;
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '.'));
    valid.then_some(name)
}

/// Resolves every whole-token `$name` string in `template` against
/// `candidate`. Missing variables become empty strings; other leaves pass
/// through unchanged.
pub fn substitute(template: &Value, candidate: &Value) -> Value {
    match template {
        Value::String(text) => match variable_token(text) {
            Some(name) => get(candidate, name)
                .cloned()
                .unwrap_or_else(|| Value::String(String::new())),
            None => template.clone(),
        },
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| substitute(item, candidate))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, value)| (key.clone(), substitute(value, candidate)))
                .collect::<Map<_, _>>(),
        ),
        other => other.clone(),
    }
}
