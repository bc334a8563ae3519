use serde_json::{Map, Value};

use crate::error::ConfigurationError;
use crate::path;
use crate::spec::document::SchemaDocument;
use crate::spec::output::{OutputDescriptor, WriteMode};
use crate::state::FormState;
use crate::visibility::{field_key, resolve_visibility};

/// Resolves the descriptor template against `selection` and writes the
/// fragment into `document` at the descriptor path.
///
/// An object selection is the substitution context as is; any other value is
/// exposed to the template as `$value`.
pub fn apply(
    output: &OutputDescriptor,
    selection: &Value,
    document: &mut Value,
) -> Result<(), ConfigurationError> {
    let fragment = match selection {
        Value::Object(_) => path::substitute(&output.tpl, selection),
        other => {
            let mut context = Map::new();
            context.insert("value".into(), other.clone());
            path::substitute(&output.tpl, &Value::Object(context))
        }
    };
    write(document, &output.path, output.mode, fragment)
}

/// Writes `fragment` at the dotted `target`, creating intermediate objects.
pub fn write(
    document: &mut Value,
    target: &str,
    mode: WriteMode,
    fragment: Value,
) -> Result<(), ConfigurationError> {
    let parts: Vec<&str> = target.split('.').collect();
    if target.is_empty() || parts.iter().any(|part| part.is_empty()) {
        return Err(ConfigurationError::InvalidOutputPath(target.to_string()));
    }
    if document.is_null() {
        *document = Value::Object(Map::new());
    }

    let (leaf, parents) = parts
        .split_last()
        .ok_or_else(|| ConfigurationError::InvalidOutputPath(target.to_string()))?;
    let mut current = document;
    let mut walked = Vec::with_capacity(parents.len());
    for part in parents {
        current = object_mut(current, target, &walked)?
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        walked.push(*part);
    }
    let container = object_mut(current, target, &walked)?;

    match mode {
        WriteMode::Set => {
            container.insert(leaf.to_string(), fragment);
        }
        WriteMode::Append => {
            let slot = container
                .entry(leaf.to_string())
                .or_insert_with(|| Value::Array(Vec::new()));
            match slot {
                Value::Array(items) => items.push(fragment),
                other => return Err(conflict(target, &parts, other)),
            }
        }
    }
    Ok(())
}

fn object_mut<'a>(
    value: &'a mut Value,
    target: &str,
    walked: &[&str],
) -> Result<&'a mut Map<String, Value>, ConfigurationError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(conflict(target, walked, other)),
    }
}

fn conflict(target: &str, walked: &[&str], found: &Value) -> ConfigurationError {
    let segment = if walked.is_empty() {
        "<root>".to_string()
    } else {
        walked.join(".")
    };
    ConfigurationError::PathConflict {
        path: target.to_string(),
        segment,
        found: match found {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        },
    }
}

/// Assembles the final metadata document from the form state.
///
/// Fields are visited in schema order; hidden fields, fields without an
/// output descriptor and fields without a value are skipped. Under `append`
/// an array value is applied one element at a time so repeated selections
/// accumulate; under `set` the whole array is written once.
pub fn materialize(
    document: &SchemaDocument,
    state: &FormState,
) -> Result<Value, ConfigurationError> {
    let visibility = resolve_visibility(document, state);
    let mut out = Value::Object(Map::new());
    for (section, field) in document.fields() {
        let Some(output) = &field.output else {
            continue;
        };
        if !visibility.get(&field_key(section, field)).copied().unwrap_or(false) {
            continue;
        }
        match state.value(&field.id) {
            None | Some(Value::Null) => {}
            Some(Value::Array(selections)) if output.mode == WriteMode::Append => {
                for selection in selections {
                    apply(output, selection, &mut out)?;
                }
            }
            Some(value) => apply(output, value, &mut out)?,
        }
    }
    Ok(out)
}
