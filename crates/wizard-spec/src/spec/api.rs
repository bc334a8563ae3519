use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

fn default_result_limit() -> usize {
    10
}

/// HTTP verb used to reach an upstream API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
}

/// Mapper strategy name plus its strategy-specific parameters.
///
/// The strategy is kept as a plain string so that a schema naming an unknown
/// strategy still loads; the problem is reported as a configuration error
/// when the mapper is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MapperSpec {
    pub strategy: String,
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl MapperSpec {
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(Value::as_str)
    }
}

/// How to query one external lookup API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ApiDescriptor {
    pub url: String,
    pub query_param: String,
    #[serde(default)]
    pub method: HttpMethod,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra_params: BTreeMap<String, Value>,
    /// Request parameter name -> dotted path into the form state values.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra_params_from_context: BTreeMap<String, String>,
    #[serde(default)]
    pub result_path: String,
    #[serde(default = "default_result_limit")]
    pub result_limit: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapper: Option<MapperSpec>,
}
