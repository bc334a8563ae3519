use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::condition::Condition;
use crate::config::EngineConfig;
use crate::error::{ConfigurationError, EngineError};
use crate::mapper::{CandidateRecord, Mapper};
use crate::output;
use crate::path;
use crate::spec::api::ApiDescriptor;
use crate::spec::document::SchemaDocument;
use crate::state::FormState;
use crate::template;
use crate::transport::{HttpTransport, Transport, UpstreamRequest};
use crate::visibility::{VisibilityMap, resolve_visibility, visible_in};

/// Schema interpretation engine.
///
/// Holds the schema loaded at startup behind an `Arc` and never mutates it;
/// clones share the same document and transport.
#[derive(Clone)]
pub struct Engine {
    schema: Arc<SchemaDocument>,
    transport: Arc<dyn Transport>,
    config: EngineConfig,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("schema_version", &self.schema.version)
            .field("apis", &self.schema.apis.len())
            .field("config", &self.config)
            .finish()
    }
}

impl Engine {
    /// Engine talking to upstream APIs over HTTP.
    pub fn new(schema: SchemaDocument, config: EngineConfig) -> Result<Self, reqwest::Error> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self::with_transport(Arc::new(schema), Arc::new(transport), config))
    }

    pub fn with_transport(
        schema: Arc<SchemaDocument>,
        transport: Arc<dyn Transport>,
        config: EngineConfig,
    ) -> Self {
        Self {
            schema,
            transport,
            config,
        }
    }

    pub fn schema(&self) -> &SchemaDocument {
        &self.schema
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    /// Checks `condition` against the engine's schema, so references to
    /// undeclared fields are false.
    pub fn visible(&self, condition: Option<&Condition>, state: &FormState) -> bool {
        visible_in(&self.schema, condition, state)
    }

    pub fn visibility(&self, state: &FormState) -> VisibilityMap {
        resolve_visibility(&self.schema, state)
    }

    pub fn materialize(&self, state: &FormState) -> Result<Value, ConfigurationError> {
        output::materialize(&self.schema, state)
    }

    fn api(&self, api_id: &str) -> Result<&ApiDescriptor, ConfigurationError> {
        self.schema
            .api(api_id)
            .ok_or_else(|| ConfigurationError::UnknownApi(api_id.to_string()))
    }

    /// Builds the upstream request without issuing it.
    ///
    /// Literal `extra_params` come first, then parameters drawn from the form
    /// state, and the query parameter last so it wins on a name clash.
    pub fn build_request(
        &self,
        api_id: &str,
        query: &str,
        state: &FormState,
    ) -> Result<UpstreamRequest, ConfigurationError> {
        let api = self.api(api_id)?;
        let mut params: Vec<(String, String)> = Vec::new();
        let mut set = |name: &str, value: String| {
            params.retain(|(key, _)| key != name);
            params.push((name.to_string(), value));
        };
        for (name, value) in &api.extra_params {
            if let Some(text) = template::render(value) {
                set(name, text);
            }
        }
        for (name, context_path) in &api.extra_params_from_context {
            if let Some(text) = state
                .lookup(context_path)
                .and_then(template::render)
                .filter(|text| !text.is_empty())
            {
                set(name, text);
            }
        }
        set(&api.query_param, query.to_string());

        Ok(UpstreamRequest {
            api_id: api_id.to_string(),
            method: api.method,
            url: api.url.clone(),
            params,
            headers: api
                .headers
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
            timeout: api
                .timeout_ms
                .map(Duration::from_millis)
                .unwrap_or_else(|| self.config.timeout()),
        })
    }

    /// Queries an upstream API and normalizes its hits.
    ///
    /// Upstream failures are returned as errors, never as an empty list; an
    /// absent result list is an empty match. Entries that fail to map are
    /// skipped. Upstream order is preserved.
    pub fn search(
        &self,
        api_id: &str,
        query: &str,
        state: &FormState,
    ) -> Result<Vec<CandidateRecord>, EngineError> {
        let api = self.api(api_id)?;
        let mapper = Mapper::from_spec(api.mapper.as_ref())?;
        let request = self.build_request(api_id, query, state)?;

        tracing::debug!(
            api = api_id,
            url = %request.url,
            timeout_ms = request.timeout.as_millis() as u64,
            "issuing upstream request"
        );
        let body = self.transport.execute(&request).inspect_err(|err| {
            tracing::warn!(api = api_id, error = %err, "upstream request failed");
        })?;

        let hits: &[Value] = match path::get(&body, &api.result_path) {
            Some(Value::Array(hits)) => hits.as_slice(),
            Some(_) | None => {
                tracing::debug!(api = api_id, path = %api.result_path, "no result list in response");
                &[]
            }
        };

        let results: Vec<CandidateRecord> = hits
            .iter()
            .take(api.result_limit)
            .enumerate()
            .filter_map(|(index, hit)| match mapper.map(hit) {
                Ok(record) => Some(record),
                Err(err) => {
                    tracing::warn!(api = api_id, index, error = %err, "skipping unmappable entry");
                    None
                }
            })
            .collect();
        tracing::debug!(api = api_id, total = results.len(), "search complete");
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct NoNetwork;

    impl Transport for NoNetwork {
        fn execute(&self, request: &UpstreamRequest) -> Result<Value, crate::UpstreamError> {
            panic!("unexpected upstream call to {}", request.url)
        }
    }

    fn engine(apis: Value) -> Engine {
        let schema: SchemaDocument =
            serde_json::from_value(json!({ "apis": apis, "sections": [] })).unwrap();
        Engine::with_transport(Arc::new(schema), Arc::new(NoNetwork), EngineConfig::default())
    }

    #[test]
    fn query_param_wins_over_literals() {
        let engine = engine(json!({
            "ols": {
                "url": "https://example.org/select",
                "query_param": "q",
                "extra_params": { "q": "shadowed", "ontology": "ncbitaxon", "rows": 10 }
            }
        }));
        let request = engine.build_request("ols", "mouse", &FormState::new()).unwrap();
        assert_eq!(request.param("q"), Some("mouse"));
        assert_eq!(request.param("ontology"), Some("ncbitaxon"));
        assert_eq!(request.param("rows"), Some("10"));
        assert_eq!(request.params.iter().filter(|(key, _)| key == "q").count(), 1);
    }

    #[test]
    fn context_params_come_from_form_state() {
        let engine = engine(json!({
            "mygene": {
                "url": "https://mygene.info/v3/query",
                "query_param": "q",
                "extra_params_from_context": { "species": "organism.taxon_id", "missing": "nothing" },
                "timeout_ms": 250
            }
        }));
        let state = FormState::new().with_value("organism", json!({ "taxon_id": 10090 }));
        let request = engine.build_request("mygene", "Apoe", &state).unwrap();
        assert_eq!(request.param("species"), Some("10090"));
        assert_eq!(request.param("missing"), None);
        assert_eq!(request.timeout, Duration::from_millis(250));
    }

    #[test]
    fn visible_rejects_undeclared_checkbox_fields() {
        let engine = engine(json!({}));
        let condition = Condition::CheckboxIncludes {
            field_id: "ghost".into(),
            value: json!("x"),
        };
        let state = FormState::new().with_value("ghost", json!(["x"]));
        assert!(!engine.visible(Some(&condition), &state));
        assert!(engine.visible(None, &state));
    }

    #[test]
    fn unknown_api_is_configuration_error() {
        let engine = engine(json!({}));
        let err = engine.search("nope", "x", &FormState::new()).unwrap_err();
        assert_eq!(
            err,
            EngineError::Configuration(ConfigurationError::UnknownApi("nope".into()))
        );
    }

    #[test]
    fn unknown_strategy_fails_before_any_request() {
        let engine = engine(json!({
            "odd": { "url": "https://example.org", "query_param": "q", "mapper": { "strategy": "telepathy" } }
        }));
        let err = engine.search("odd", "x", &FormState::new()).unwrap_err();
        assert_eq!(
            err,
            EngineError::Configuration(ConfigurationError::UnknownStrategy("telepathy".into()))
        );
    }
}
