//! `{{ ... }}` placeholders used by template-driven mapper strategies.
//!
//! A placeholder holds one or more alternatives separated by `||`; the first
//! alternative that resolves to a non-empty value wins. Alternatives are
//! dotted paths (`institution-name.[0]`) or array filters
//! (`names.[?types=ror_display].value`).

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::Value;

use crate::path;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{([^}]+)\}\}").expect("placeholder regex"));

static ARRAY_FILTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([^.]+)\.\[\?([^=]+)=([^\]]+)\]\.(.+)$").expect("array filter regex")
});

/// Expands every placeholder in `template` against `hit`.
pub fn resolve(template: &str, hit: &Value) -> String {
    if !template.contains("{{") {
        return template.to_string();
    }
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            caps[1]
                .split("||")
                .map(str::trim)
                .filter_map(|alternative| resolve_expr(alternative, hit))
                .find_map(|value| render(value).filter(|text| !text.is_empty()))
                .unwrap_or_default()
        })
        .into_owned()
}

/// Resolves a single alternative to the value it points at.
pub fn resolve_expr<'a>(expr: &str, hit: &'a Value) -> Option<&'a Value> {
    if expr.is_empty() {
        return None;
    }
    if expr.contains(".[?") {
        return resolve_filtered(expr, hit);
    }
    path::get(hit, expr)
}

fn resolve_filtered<'a>(expr: &str, hit: &'a Value) -> Option<&'a Value> {
    let caps = ARRAY_FILTER.captures(expr)?;
    let (base, field, expected, result) = (&caps[1], &caps[2], &caps[3], &caps[4]);
    path::get(hit, base)?
        .as_array()?
        .iter()
        .filter_map(Value::as_object)
        .find(|item| match item.get(field) {
            Some(Value::String(text)) => text == expected,
            Some(Value::Array(values)) => values.iter().any(|value| value == expected),
            _ => false,
        })
        .and_then(|item| item.get(result))
}

/// Text form of a resolved value; `None` for null.
pub fn render(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Number(number) => Some(number.to_string()),
        other => Some(other.to_string()),
    }
}
