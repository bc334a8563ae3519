use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::state::FormState;

/// Visibility rule attached to a section or field.
///
/// Unrecognised `type` tags deserialize as [`Condition::Unknown`] and are
/// always hidden, so a schema written for a newer engine degrades to hidden
/// content instead of failing to load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition {
    CheckboxIncludes { field_id: String, value: Value },
    OrganismTrigger { trigger: String },
    All { conditions: Vec<Condition> },
    Any { conditions: Vec<Condition> },
    Not { condition: Box<Condition> },
    #[serde(other)]
    Unknown,
}

impl Condition {
    /// Evaluates against the form state. Total: missing data yields `false`.
    pub fn evaluate(&self, state: &FormState) -> bool {
        self.evaluate_with(state, &|_| true)
    }

    /// Like [`Condition::evaluate`], but `checkbox_includes` only considers
    /// fields for which `declared` returns true.
    pub fn evaluate_with(&self, state: &FormState, declared: &dyn Fn(&str) -> bool) -> bool {
        match self {
            Condition::CheckboxIncludes { field_id, value } => {
                declared(field_id)
                    && state
                        .value(field_id)
                        .and_then(Value::as_array)
                        .is_some_and(|items| items.contains(value))
            }
            Condition::OrganismTrigger { trigger } => state.has_trigger(trigger),
            Condition::All { conditions } => conditions
                .iter()
                .all(|condition| condition.evaluate_with(state, declared)),
            Condition::Any { conditions } => conditions
                .iter()
                .any(|condition| condition.evaluate_with(state, declared)),
            Condition::Not { condition } => !condition.evaluate_with(state, declared),
            Condition::Unknown => false,
        }
    }

    /// Field ids referenced anywhere in this condition.
    pub fn field_refs(&self) -> Vec<&str> {
        let mut refs = Vec::new();
        self.collect_refs(&mut refs);
        refs
    }

    fn collect_refs<'a>(&'a self, refs: &mut Vec<&'a str>) {
        match self {
            Condition::CheckboxIncludes { field_id, .. } => refs.push(field_id),
            Condition::All { conditions } | Condition::Any { conditions } => {
                for condition in conditions {
                    condition.collect_refs(refs);
                }
            }
            Condition::Not { condition } => condition.collect_refs(refs),
            Condition::OrganismTrigger { .. } | Condition::Unknown => {}
        }
    }

    pub fn contains_unknown(&self) -> bool {
        match self {
            Condition::Unknown => true,
            Condition::All { conditions } | Condition::Any { conditions } => {
                conditions.iter().any(Condition::contains_unknown)
            }
            Condition::Not { condition } => condition.contains_unknown(),
            _ => false,
        }
    }
}

/// Visibility of something guarded by an optional condition.
pub fn visible(condition: Option<&Condition>, state: &FormState) -> bool {
    condition.is_none_or(|condition| condition.evaluate(state))
}
