use std::collections::BTreeSet;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::path;

/// Snapshot of what the user has entered, supplied fresh on every call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FormState {
    /// Field id -> entered or selected value(s).
    #[serde(default)]
    pub values: Map<String, Value>,
    /// Triggers activated by earlier UI interactions (e.g. organism selection).
    #[serde(default)]
    pub triggers: BTreeSet<String>,
}

impl FormState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(mut self, field_id: &str, value: Value) -> Self {
        self.values.insert(field_id.to_string(), value);
        self
    }

    pub fn with_trigger(mut self, trigger: &str) -> Self {
        self.triggers.insert(trigger.to_string());
        self
    }

    pub fn value(&self, field_id: &str) -> Option<&Value> {
        self.values.get(field_id)
    }

    /// Dotted lookup across the value map, e.g. `organism.taxon_id`.
    pub fn lookup(&self, dotted: &str) -> Option<&Value> {
        let mut parts = dotted.splitn(2, '.');
        let head = self.values.get(parts.next()?)?;
        match parts.next() {
            Some(rest) => path::get(head, rest),
            None => Some(head),
        }
    }

    pub fn has_trigger(&self, trigger: &str) -> bool {
        self.triggers.contains(trigger)
    }
}
