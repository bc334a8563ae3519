use std::collections::BTreeSet;

use crate::condition::Condition;
use crate::spec::document::{FieldSpec, SchemaDocument, SectionSpec};
use crate::state::FormState;

/// Visibility keyed by section id and `section_id.field_id`.
pub type VisibilityMap = std::collections::BTreeMap<String, bool>;

pub fn field_key(section: &SectionSpec, field: &FieldSpec) -> String {
    format!("{}.{}", section.id, field.id)
}

/// Evaluates one condition against `state` with the document's declared
/// fields; `checkbox_includes` on an undeclared field is false.
pub fn visible_in(
    document: &SchemaDocument,
    condition: Option<&Condition>,
    state: &FormState,
) -> bool {
    let declared = document.field_ids();
    let is_declared = |id: &str| declared.contains(id);
    condition.is_none_or(|condition| condition.evaluate_with(state, &is_declared))
}

/// Evaluates every section and field condition of the document.
///
/// Fields inside a hidden section are hidden, and `checkbox_includes`
/// conditions naming a field the document does not declare are false.
pub fn resolve_visibility(document: &SchemaDocument, state: &FormState) -> VisibilityMap {
    let declared: BTreeSet<&str> = document.field_ids();
    let is_declared = |id: &str| declared.contains(id);
    let check = |condition: Option<&Condition>| {
        condition.is_none_or(|condition| condition.evaluate_with(state, &is_declared))
    };

    let mut map = VisibilityMap::new();
    for section in &document.sections {
        let section_visible = check(section.condition.as_ref());
        map.insert(section.id.clone(), section_visible);
        for field in &section.fields {
            let visible = section_visible && check(field.condition.as_ref());
            map.insert(field_key(section, field), visible);
        }
    }
    map
}
