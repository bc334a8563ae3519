use std::collections::BTreeSet;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::condition::Condition;
use crate::mapper::Mapper;
use crate::spec::document::{FieldType, SchemaDocument};

/// One authoring problem found in a schema document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SchemaIssue {
    pub code: String,
    /// Dotted location, e.g. `apis.mygene` or `sections.imaging.strain`.
    pub location: String,
    pub message: String,
}

/// Advisory report; evaluation never depends on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DiagnosticReport {
    pub valid: bool,
    pub issues: Vec<SchemaIssue>,
}

fn issue(code: &str, location: String, message: String) -> SchemaIssue {
    SchemaIssue {
        code: code.into(),
        location,
        message,
    }
}

pub fn diagnose(document: &SchemaDocument) -> DiagnosticReport {
    let mut issues = Vec::new();

    for (api_id, api) in &document.apis {
        if let Err(err) = Mapper::from_spec(api.mapper.as_ref()) {
            issues.push(issue(
                "unknown_strategy",
                format!("apis.{api_id}"),
                err.to_string(),
            ));
        }
    }

    let declared = document.field_ids();
    let mut section_ids = BTreeSet::new();
    for section in &document.sections {
        let section_location = format!("sections.{}", section.id);
        if !section_ids.insert(section.id.as_str()) {
            issues.push(issue(
                "duplicate_section",
                section_location.clone(),
                format!("section id '{}' is used more than once", section.id),
            ));
        }
        if let Some(condition) = &section.condition {
            check_condition(condition, &declared, &section_location, &mut issues);
        }

        let mut field_ids = BTreeSet::new();
        for field in &section.fields {
            let location = format!("{section_location}.{}", field.id);
            if !field_ids.insert(field.id.as_str()) {
                issues.push(issue(
                    "duplicate_field",
                    location.clone(),
                    format!("field id '{}' repeats within its section", field.id),
                ));
            }
            if let Some(condition) = &field.condition {
                check_condition(condition, &declared, &location, &mut issues);
            }
            match (&field.kind, &field.api) {
                (_, Some(api)) if document.api(api).is_none() => issues.push(issue(
                    "dangling_api",
                    location.clone(),
                    format!("API '{api}' is not defined in apis"),
                )),
                (FieldType::ApiSearch, None) => issues.push(issue(
                    "missing_api",
                    location.clone(),
                    "api_search field has no api reference".into(),
                )),
                _ => {}
            }
            if let Some(output) = &field.output
                && output.path.split('.').any(str::is_empty)
            {
                issues.push(issue(
                    "empty_output_path",
                    location.clone(),
                    format!("output path '{}' has an empty segment", output.path),
                ));
            }
        }
    }

    DiagnosticReport {
        valid: issues.is_empty(),
        issues,
    }
}

fn check_condition(
    condition: &Condition,
    declared: &BTreeSet<&str>,
    location: &str,
    issues: &mut Vec<SchemaIssue>,
) {
    for field_id in condition.field_refs() {
        if !declared.contains(field_id) {
            issues.push(issue(
                "dangling_condition",
                location.to_string(),
                format!("condition references undeclared field '{field_id}'"),
            ));
        }
    }
    if condition.contains_unknown() {
        issues.push(issue(
            "unknown_condition",
            location.to_string(),
            "condition kind is not recognised and will always hide this element".into(),
        ));
    }
}
