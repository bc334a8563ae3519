use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

use wizard_spec::{
    Condition, ConfigurationError, Engine, EngineConfig, EngineError, FormState, SchemaDocument,
    SchemaError, diagnose, materialize as wizard_materialize, resolve_visibility, visible_in,
};

const DEFAULT_SCHEMA: &str = include_str!("../assets/default_schema.json");

#[derive(Debug, Error)]
enum ComponentError {
    #[error("failed to parse config: {0}")]
    ConfigParse(#[source] serde_json::Error),
    #[error("invalid schema document: {0}")]
    Schema(#[from] SchemaError),
    #[error("http client unavailable: {0}")]
    Client(String),
    #[error("failed to parse form state: {0}")]
    StateParse(#[source] serde_json::Error),
    #[error("failed to parse condition: {0}")]
    ConditionParse(#[source] serde_json::Error),
    #[error("query must not be empty")]
    EmptyQuery,
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Output(#[from] ConfigurationError),
    #[error("json encode error: {0}")]
    JsonEncode(#[source] serde_json::Error),
}

impl ComponentError {
    /// Coarse class callers branch on: bad schema, failing upstream or bad request.
    fn kind(&self) -> &'static str {
        match self {
            ComponentError::Engine(EngineError::Upstream(_)) => "upstream",
            ComponentError::StateParse(_)
            | ComponentError::ConditionParse(_)
            | ComponentError::EmptyQuery => "input",
            ComponentError::ConfigParse(_)
            | ComponentError::Schema(_)
            | ComponentError::Client(_)
            | ComponentError::Engine(EngineError::Configuration(_))
            | ComponentError::Output(_)
            | ComponentError::JsonEncode(_) => "configuration",
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Default)]
struct ComponentConfig {
    #[serde(default)]
    schema_json: Option<String>,
    #[serde(default)]
    engine: EngineConfig,
}

fn parse_config(config_json: &str) -> Result<ComponentConfig, ComponentError> {
    if config_json.trim().is_empty() {
        Ok(ComponentConfig::default())
    } else {
        serde_json::from_str(config_json).map_err(ComponentError::ConfigParse)
    }
}

fn load_schema(config: &ComponentConfig) -> Result<SchemaDocument, ComponentError> {
    let schema_json = config.schema_json.as_deref().unwrap_or(DEFAULT_SCHEMA);
    Ok(SchemaDocument::from_slice(schema_json.as_bytes())?)
}

fn parse_state(state_json: &str) -> Result<FormState, ComponentError> {
    if state_json.trim().is_empty() {
        return Ok(FormState::default());
    }
    serde_json::from_str(state_json).map_err(ComponentError::StateParse)
}

fn respond(result: Result<Value, ComponentError>) -> String {
    match result {
        Ok(value) => serde_json::to_string(&value).unwrap_or_else(|error| {
            json!({ "error": format!("json encode: {}", error), "kind": "configuration" })
                .to_string()
        }),
        Err(err) => {
            tracing::debug!(kind = err.kind(), error = %err, "component call failed");
            json!({ "error": err.to_string(), "kind": err.kind() }).to_string()
        }
    }
}

fn schema_from(config_json: &str) -> Result<SchemaDocument, ComponentError> {
    load_schema(&parse_config(config_json)?)
}

fn encode<T: Serialize>(value: T) -> Result<Value, ComponentError> {
    serde_json::to_value(value).map_err(ComponentError::JsonEncode)
}

pub fn describe(config_json: &str) -> String {
    respond(schema_from(config_json).and_then(encode))
}

pub fn visibility(config_json: &str, state_json: &str) -> String {
    respond(schema_from(config_json).and_then(|schema| {
        let state = parse_state(state_json)?;
        encode(resolve_visibility(&schema, &state))
    }))
}

fn evaluate_condition(
    config_json: &str,
    condition_json: &str,
    state_json: &str,
) -> Result<Value, ComponentError> {
    let schema = schema_from(config_json)?;
    let condition: Option<Condition> = if condition_json.trim().is_empty() {
        None
    } else {
        serde_json::from_str(condition_json).map_err(ComponentError::ConditionParse)?
    };
    let state = parse_state(state_json)?;
    Ok(json!({ "visible": visible_in(&schema, condition.as_ref(), &state) }))
}

/// Evaluates one condition object against the state within the configured
/// schema; `{"visible": bool}`.
pub fn condition(config_json: &str, condition_json: &str, state_json: &str) -> String {
    respond(evaluate_condition(config_json, condition_json, state_json))
}

pub fn search(config_json: &str, api_id: &str, query: &str, state_json: &str) -> String {
    let engine = parse_config(config_json).and_then(|config| {
        let schema = load_schema(&config)?;
        Engine::new(schema, config.engine).map_err(|err| ComponentError::Client(err.to_string()))
    });
    match engine {
        Ok(engine) => search_with(&engine, api_id, query, state_json),
        Err(err) => respond(Err(err)),
    }
}

fn run_search(
    engine: &Engine,
    api_id: &str,
    query: &str,
    state_json: &str,
) -> Result<Value, ComponentError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(ComponentError::EmptyQuery);
    }
    let state = parse_state(state_json)?;
    let results = engine.search(api_id, query, &state)?;
    let total = results.len();
    Ok(json!({ "results": encode(results)?, "total": total }))
}

/// Runs a search on an existing engine; `{"results": [...], "total": n}`.
pub fn search_with(engine: &Engine, api_id: &str, query: &str, state_json: &str) -> String {
    respond(run_search(engine, api_id, query, state_json))
}

pub fn materialize(config_json: &str, state_json: &str) -> String {
    respond(schema_from(config_json).and_then(|schema| {
        let state = parse_state(state_json)?;
        Ok(wizard_materialize(&schema, &state)?)
    }))
}

pub fn diagnostics(config_json: &str) -> String {
    respond(schema_from(config_json).and_then(|schema| encode(diagnose(&schema))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use wizard_spec::{Transport, UpstreamError, UpstreamRequest};

    struct Canned(Result<Value, UpstreamError>);

    impl Transport for Canned {
        fn execute(&self, _request: &UpstreamRequest) -> Result<Value, UpstreamError> {
            self.0.clone()
        }
    }

    fn engine(outcome: Result<Value, UpstreamError>) -> Engine {
        let schema = SchemaDocument::from_slice(DEFAULT_SCHEMA.as_bytes()).expect("schema");
        Engine::with_transport(
            Arc::new(schema),
            Arc::new(Canned(outcome)),
            EngineConfig::default(),
        )
    }

    fn parse(payload: &str) -> Value {
        serde_json::from_str(payload).expect("json")
    }

    #[test]
    fn describe_returns_default_schema() {
        let schema = parse(&describe(""));
        assert_eq!(schema["version"], "2.1.0");
        assert!(schema["apis"].get("ols_ncbitaxon").is_some());
    }

    #[test]
    fn describe_uses_configured_schema() {
        let config = json!({
            "schema_json": json!({ "version": "9.9.9", "sections": [] }).to_string()
        });
        let schema = parse(&describe(&config.to_string()));
        assert_eq!(schema["version"], "9.9.9");
    }

    #[test]
    fn bad_config_is_a_configuration_error() {
        let payload = parse(&describe("{not json"));
        assert_eq!(payload["kind"], "configuration");
        assert!(payload["error"].as_str().unwrap().contains("config"));
    }

    #[test]
    fn visibility_follows_state() {
        let state = json!({ "values": { "data_types": ["imaging"] } });
        let map = parse(&visibility("", &state.to_string()));
        assert_eq!(map["imaging"], true);
        assert_eq!(map["organism.strain"], false);
    }

    #[test]
    fn bad_state_is_an_input_error() {
        let payload = parse(&visibility("", "[1, 2"));
        assert_eq!(payload["kind"], "input");
    }

    #[test]
    fn condition_reports_visibility() {
        let rule = json!({ "type": "organism_trigger", "trigger": "mouse" }).to_string();
        let state = json!({ "triggers": ["mouse"] });
        let payload = parse(&condition("", &rule, &state.to_string()));
        assert_eq!(payload["visible"], true);

        let payload = parse(&condition("", &rule, "{}"));
        assert_eq!(payload["visible"], false);

        let payload = parse(&condition("", "", "{}"));
        assert_eq!(payload["visible"], true);
    }

    #[test]
    fn condition_on_undeclared_field_is_hidden() {
        let state = json!({ "values": { "ghost": ["x"], "data_types": ["x"] } }).to_string();
        let ghost = json!({ "type": "checkbox_includes", "field_id": "ghost", "value": "x" });
        let payload = parse(&condition("", &ghost.to_string(), &state));
        assert_eq!(payload["visible"], false);

        let declared = json!({
            "type": "checkbox_includes",
            "field_id": "data_types",
            "value": "x"
        });
        let payload = parse(&condition("", &declared.to_string(), &state));
        assert_eq!(payload["visible"], true);
    }

    #[test]
    fn generic_results_keep_resolved_id_and_label() {
        let engine = engine(Ok(json!({
            "hits": { "hits": [
                { "id": "X1", "label": null, "name": "Real name" },
                { "id": "", "identifier": "X2", "name": "Two" }
            ] }
        })));
        let payload = parse(&search_with(&engine, "zenodo_communities", "mouse", ""));
        assert_eq!(
            payload["results"],
            json!([
                { "id": "X1", "label": "Real name" },
                { "id": "X2", "label": "Two" }
            ])
        );
    }

    #[test]
    fn search_envelope_carries_results_and_total() {
        let engine = engine(Ok(json!({
            "response": { "docs": [{ "short_form": "NCBITaxon_9606", "label": "Homo sapiens" }] }
        })));
        let payload = parse(&search_with(&engine, "ols_ncbitaxon", "human", ""));
        assert_eq!(payload["total"], 1);
        assert_eq!(
            payload["results"],
            json!([{ "id": "NCBITaxon_9606", "label": "Homo sapiens", "scheme": "NCBITaxon" }])
        );
    }

    #[test]
    fn search_errors_are_classified() {
        let timed_out = engine(Err(UpstreamError::Timeout {
            api: "ols_efo".into(),
        }));
        let payload = parse(&search_with(&timed_out, "ols_efo", "tamoxifen", ""));
        assert_eq!(payload["kind"], "upstream");
        assert!(payload.get("results").is_none());

        let payload = parse(&search_with(&timed_out, "nonexistent_api", "x", ""));
        assert_eq!(payload["kind"], "configuration");

        let payload = parse(&search_with(&timed_out, "ols_efo", "   ", ""));
        assert_eq!(payload["kind"], "input");
    }

    #[test]
    fn empty_upstream_is_a_successful_empty_search() {
        let engine = engine(Ok(json!({ "response": { "docs": [] } })));
        let payload = parse(&search_with(&engine, "ols_efo", "tamoxifen", ""));
        assert_eq!(payload, json!({ "results": [], "total": 0 }));
    }

    #[test]
    fn materialize_builds_document() {
        let state = json!({
            "values": {
                "title": "Cohort",
                "license": "MIT"
            }
        });
        let document = parse(&materialize("", &state.to_string()));
        assert_eq!(document["titles"], json!([{ "title": "Cohort" }]));
        assert_eq!(document["rightsList"], json!([{ "rightsIdentifier": "MIT" }]));
    }

    #[test]
    fn diagnostics_flags_unknown_api() {
        let schema = json!({
            "sections": [{
                "id": "s",
                "title": "S",
                "fields": [{ "id": "f", "label": "F", "type": "api_search", "api": "missing" }]
            }]
        });
        let config = json!({ "schema_json": schema.to_string() });
        let report = parse(&diagnostics(&config.to_string()));
        assert_eq!(report["valid"], false);
        assert_eq!(report["issues"][0]["code"], "dangling_api");
    }
}
