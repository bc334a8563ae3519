use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ConfigurationError, MapError};
use crate::spec::api::MapperSpec;
use crate::template;

/// Normalized lookup result handed to the UI and to output templates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CandidateRecord {
    pub id: String,
    pub label: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CandidateRecord {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            extra: Map::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.extra.insert(key.to_string(), value.into());
        self
    }

    /// Flat object view used as the `$variable` context.
    pub fn to_value(&self) -> Value {
        let mut map = self.extra.clone();
        map.insert("id".into(), Value::String(self.id.clone()));
        map.insert("label".into(), Value::String(self.label.clone()));
        Value::Object(map)
    }
}

/// Cross-reference template of the template-driven strategies.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct XrefTemplate {
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub label: Option<String>,
}

/// Field templates shared by `flat_object`, `nested_object` and `array_find`.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldTemplates {
    pub label: String,
    pub sublabel: String,
    pub id: String,
    pub scheme: String,
    pub xrefs: Option<BTreeMap<String, XrefTemplate>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateStrategy {
    FlatObject,
    NestedObject,
    ArrayFind,
}

impl TemplateStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateStrategy::FlatObject => "flat_object",
            TemplateStrategy::NestedObject => "nested_object",
            TemplateStrategy::ArrayFind => "array_find",
        }
    }
}

/// Named mappers registered in code for payloads templates cannot express.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomMapper {
    NormalizeMgi,
}

impl CustomMapper {
    pub fn lookup(name: &str) -> Option<Self> {
        match name {
            "normalize_mgi" => Some(CustomMapper::NormalizeMgi),
            _ => None,
        }
    }
}

/// A mapper strategy ready to normalize raw upstream hits.
#[derive(Debug, Clone, PartialEq)]
pub enum Mapper {
    Generic,
    OboOntology { scheme: String },
    Templates {
        strategy: TemplateStrategy,
        templates: FieldTemplates,
    },
    Custom(CustomMapper),
}

const ID_KEYS: [&str; 3] = ["id", "identifier", "_id"];
const LABEL_KEYS: [&str; 4] = ["label", "name", "title", "symbol"];

impl Mapper {
    /// Builds the mapper for an API; `None` selects the generic strategy.
    pub fn from_spec(spec: Option<&MapperSpec>) -> Result<Self, ConfigurationError> {
        let Some(spec) = spec else {
            return Ok(Mapper::Generic);
        };
        let template_strategy = match spec.strategy.as_str() {
            "generic" => return Ok(Mapper::Generic),
            "obo_ontology" => {
                return Ok(Mapper::OboOntology {
                    scheme: spec.param_str("scheme").unwrap_or("OBO").to_string(),
                });
            }
            "custom" => {
                let name = spec.param_str("function_name").unwrap_or_default();
                return CustomMapper::lookup(name)
                    .map(Mapper::Custom)
                    .ok_or_else(|| ConfigurationError::UnknownCustomMapper(name.to_string()));
            }
            "flat_object" => TemplateStrategy::FlatObject,
            "nested_object" => TemplateStrategy::NestedObject,
            "array_find" => TemplateStrategy::ArrayFind,
            other => return Err(ConfigurationError::UnknownStrategy(other.to_string())),
        };
        let xrefs = match spec.params.get("xrefs") {
            None | Some(Value::Null) => None,
            Some(raw) => Some(serde_json::from_value(raw.clone()).map_err(|err| {
                ConfigurationError::InvalidMapperParams {
                    strategy: spec.strategy.clone(),
                    message: format!("xrefs: {err}"),
                }
            })?),
        };
        let text = |key: &str| spec.param_str(key).unwrap_or_default().to_string();
        Ok(Mapper::Templates {
            strategy: template_strategy,
            templates: FieldTemplates {
                label: text("label"),
                sublabel: text("sublabel"),
                id: text("id"),
                scheme: text("scheme"),
                xrefs,
            },
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Mapper::Generic => "generic",
            Mapper::OboOntology { .. } => "obo_ontology",
            Mapper::Templates { strategy, .. } => strategy.as_str(),
            Mapper::Custom(_) => "custom",
        }
    }

    pub fn map(&self, raw: &Value) -> Result<CandidateRecord, MapError> {
        let strategy = self.name();
        let hit = raw.as_object().ok_or_else(|| {
            MapError::new(strategy, format!("expected an object, found {}", kind_of(raw)))
        })?;
        match self {
            Mapper::Generic => map_generic(hit),
            Mapper::OboOntology { scheme } => Ok(map_obo(hit, scheme)),
            Mapper::Templates { templates, .. } => Ok(map_templates(raw, templates)),
            Mapper::Custom(CustomMapper::NormalizeMgi) => Ok(map_mgi(hit)),
        }
    }
}

fn pick(hit: &Map<String, Value>, keys: &[&'static str]) -> Option<(&'static str, String)> {
    keys.iter().find_map(|key| {
        hit.get(*key)
            .and_then(template::render)
            .filter(|text| !text.is_empty())
            .map(|text| (*key, text))
    })
}

fn map_generic(hit: &Map<String, Value>) -> Result<CandidateRecord, MapError> {
    let id = pick(hit, &ID_KEYS);
    let label = pick(hit, &LABEL_KEYS);
    if id.is_none() && label.is_none() {
        return Err(MapError::new("generic", "no id or label key present"));
    }
    let used: Vec<&str> = id.iter().chain(label.iter()).map(|(key, _)| *key).collect();
    // `id` and `label` would shadow the record's own keys once flattened.
    let extra = hit
        .iter()
        .filter(|(key, _)| !matches!(key.as_str(), "id" | "label"))
        .filter(|(key, _)| !used.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    let id = id.map(|(_, text)| text).unwrap_or_default();
    let label = label.map(|(_, text)| text).unwrap_or_else(|| id.clone());
    Ok(CandidateRecord { id, label, extra })
}

fn map_obo(hit: &Map<String, Value>, scheme: &str) -> CandidateRecord {
    let text = |key: &str| {
        hit.get(key)
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
    };
    let id = text("obo_id").or_else(|| text("short_form")).unwrap_or_default();
    let mut record = CandidateRecord::new(id, text("label").unwrap_or("?")).with("scheme", scheme);
    if let Some(iri) = text("iri") {
        record = record.with("uri", iri);
    }
    if let Some(obo_id) = text("obo_id") {
        record = record.with("sublabel", obo_id);
    }
    let description = match hit.get("description") {
        Some(Value::Array(lines)) => lines.first().and_then(Value::as_str),
        Some(Value::String(line)) => Some(line.as_str()),
        _ => None,
    };
    if let Some(description) = description {
        record = record.with("description", description);
    }
    record
}

fn map_templates(hit: &Value, templates: &FieldTemplates) -> CandidateRecord {
    let mut record = CandidateRecord::new(
        template::resolve(&templates.id, hit),
        template::resolve(&templates.label, hit),
    )
    .with("sublabel", template::resolve(&templates.sublabel, hit))
    .with("scheme", templates.scheme.clone());
    if let Some(xrefs) = &templates.xrefs {
        record = record.with("xrefs", resolve_xrefs(hit, xrefs));
    }
    record
}

/// Resolves cross-references, dropping those whose condition or id is empty.
pub fn resolve_xrefs(hit: &Value, xrefs: &BTreeMap<String, XrefTemplate>) -> Value {
    let resolved = xrefs
        .iter()
        .filter(|(_, xref)| {
            xref.condition
                .as_deref()
                .is_none_or(|condition| !template::resolve(condition, hit).is_empty())
        })
        .filter_map(|(db, xref)| {
            let id = template::resolve(&xref.id, hit);
            if id.is_empty() {
                return None;
            }
            let label = xref.label.clone().unwrap_or_else(|| db.to_uppercase());
            Some((
                db.clone(),
                serde_json::json!({
                    "id": id,
                    "uri": template::resolve(&xref.uri, hit),
                    "label": label,
                }),
            ))
        })
        .collect::<Map<_, _>>();
    Value::Object(resolved)
}

fn map_mgi(hit: &Map<String, Value>) -> CandidateRecord {
    let raw = match hit.get("MGI") {
        Some(Value::Array(values)) => values.first().and_then(template::render),
        Some(value) => template::render(value),
        None => None,
    }
    .unwrap_or_default();
    let mgi_id = if raw.is_empty() || raw.starts_with("MGI:") {
        raw
    } else {
        format!("MGI:{raw}")
    };
    let id = if mgi_id.is_empty() {
        String::new()
    } else {
        format!("https://identifiers.org/mgi:{mgi_id}")
    };
    let text = |key: &str| hit.get(key).and_then(Value::as_str);
    CandidateRecord::new(id, text("symbol").unwrap_or("?"))
        .with("sublabel", text("name").unwrap_or_default())
        .with("scheme", "MGI")
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec(value: Value) -> MapperSpec {
        serde_json::from_value(value).expect("mapper spec")
    }

    #[test]
    fn obo_prefers_obo_id_then_short_form() {
        let mapper = Mapper::from_spec(Some(&spec(
            json!({ "strategy": "obo_ontology", "scheme": "NCBITaxon" }),
        )))
        .unwrap();
        let record = mapper
            .map(&json!({ "short_form": "NCBITaxon_9606", "label": "Homo sapiens" }))
            .unwrap();
        assert_eq!(
            record.to_value(),
            json!({ "id": "NCBITaxon_9606", "label": "Homo sapiens", "scheme": "NCBITaxon" })
        );

        let record = mapper
            .map(&json!({
                "label": "Mus musculus",
                "obo_id": "NCBITaxon:10090",
                "short_form": "NCBITaxon_10090",
                "iri": "http://purl.obolibrary.org/obo/NCBITaxon_10090",
                "description": ["House mouse"]
            }))
            .unwrap();
        assert_eq!(record.id, "NCBITaxon:10090");
        assert_eq!(record.extra["uri"], "http://purl.obolibrary.org/obo/NCBITaxon_10090");
        assert_eq!(record.extra["description"], "House mouse");
    }

    #[test]
    fn obo_fills_placeholders_for_empty_hit() {
        let mapper = Mapper::OboOntology { scheme: "EFO".into() };
        let record = mapper.map(&json!({})).unwrap();
        assert_eq!(record.label, "?");
        assert_eq!(record.id, "");
        assert_eq!(record.extra["scheme"], "EFO");
    }

    #[test]
    fn generic_extracts_common_keys() {
        let record = Mapper::Generic
            .map(&json!({ "identifier": "X1", "name": "Example", "kind": "thing" }))
            .unwrap();
        assert_eq!(record.id, "X1");
        assert_eq!(record.label, "Example");
        assert_eq!(record.extra, json!({ "kind": "thing" }).as_object().cloned().unwrap());
    }

    #[test]
    fn generic_serializes_resolved_id_and_label() {
        let first = Mapper::Generic
            .map(&json!({ "id": "X1", "label": null, "name": "Real name" }))
            .unwrap();
        let second = Mapper::Generic
            .map(&json!({ "id": "", "identifier": "X2", "name": "Two", "kind": "thing" }))
            .unwrap();
        assert_eq!(
            serde_json::to_value([&first, &second]).unwrap(),
            json!([
                { "id": "X1", "label": "Real name" },
                { "id": "X2", "label": "Two", "kind": "thing" }
            ])
        );
    }

    #[test]
    fn generic_rejects_unrecognisable_entries() {
        assert!(Mapper::Generic.map(&json!({ "foo": "bar" })).is_err());
        assert!(Mapper::Generic.map(&json!("just text")).is_err());
    }

    #[test]
    fn unknown_strategy_is_configuration_error() {
        let err = Mapper::from_spec(Some(&spec(json!({ "strategy": "telepathy" })))).unwrap_err();
        assert_eq!(err, ConfigurationError::UnknownStrategy("telepathy".into()));
    }

    #[test]
    fn unknown_custom_mapper_is_configuration_error() {
        let err = Mapper::from_spec(Some(&spec(
            json!({ "strategy": "custom", "function_name": "missing" }),
        )))
        .unwrap_err();
        assert_eq!(err, ConfigurationError::UnknownCustomMapper("missing".into()));
    }

    #[test]
    fn flat_object_resolves_templates() {
        let mapper = Mapper::from_spec(Some(&spec(json!({
            "strategy": "flat_object",
            "label": "{{symbol}}",
            "sublabel": "{{name}}",
            "id": "https://identifiers.org/ncbigene:{{_id}}",
            "scheme": "GeneID"
        }))))
        .unwrap();
        let record = mapper
            .map(&json!({ "symbol": "Apoe", "name": "apolipoprotein E", "_id": "11287" }))
            .unwrap();
        assert_eq!(record.label, "Apoe");
        assert_eq!(record.id, "https://identifiers.org/ncbigene:11287");
        assert_eq!(record.extra["sublabel"], "apolipoprotein E");
        assert_eq!(record.extra["scheme"], "GeneID");
    }

    #[test]
    fn array_find_uses_filters_and_fallbacks() {
        let mapper = Mapper::from_spec(Some(&spec(json!({
            "strategy": "array_find",
            "label": "{{names.[?types=ror_display].value || names.[?types=label].value}}",
            "sublabel": "{{addresses.[0].city}}, {{country.country_name}}",
            "id": "{{id}}",
            "scheme": "ROR"
        }))))
        .unwrap();
        let record = mapper
            .map(&json!({
                "names": [
                    { "types": ["label"], "value": "ROR Label" },
                    { "types": ["ror_display"], "value": "ROR Display" }
                ],
                "addresses": [{ "city": "Paris" }],
                "country": { "country_name": "France" },
                "id": "https://ror.org/abc123"
            }))
            .unwrap();
        assert_eq!(record.label, "ROR Display");
        assert_eq!(record.extra["sublabel"], "Paris, France");
        assert_eq!(record.id, "https://ror.org/abc123");
    }

    #[test]
    fn xrefs_skip_failed_conditions() {
        let xrefs: BTreeMap<String, XrefTemplate> = serde_json::from_value(json!({
            "ncbi_gene": { "id": "{{_id}}", "uri": "https://identifiers.org/ncbigene:{{_id}}", "label": "NCBI Gene" },
            "mgi": { "condition": "{{MGI}}", "id": "{{MGI}}", "uri": "https://identifiers.org/mgi:{{MGI}}" },
            "rgd": { "condition": "{{RGD}}", "id": "{{RGD}}", "uri": "https://identifiers.org/rgd:{{RGD}}" }
        }))
        .unwrap();
        let resolved = resolve_xrefs(&json!({ "_id": "11287", "MGI": "88057", "RGD": null }), &xrefs);
        assert!(resolved.get("ncbi_gene").is_some());
        assert_eq!(resolved["mgi"]["id"], "88057");
        assert_eq!(resolved["mgi"]["label"], "MGI");
        assert!(resolved.get("rgd").is_none());
    }

    #[test]
    fn normalize_mgi_prefixes_ids() {
        let mapper = Mapper::Custom(CustomMapper::NormalizeMgi);
        let record = mapper
            .map(&json!({ "symbol": "Apoe", "name": "apolipoprotein E", "MGI": ["88057"] }))
            .unwrap();
        assert_eq!(record.id, "https://identifiers.org/mgi:MGI:88057");
        let record = mapper.map(&json!({ "symbol": "Apoe", "MGI": "MGI:88057" })).unwrap();
        assert_eq!(record.id, "https://identifiers.org/mgi:MGI:88057");
        assert_eq!(record.extra["scheme"], "MGI");
    }
}
