use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How a resolved fragment is written at its target path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    Append,
    #[default]
    Set,
}

/// Where and how a field value lands in the output document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OutputDescriptor {
    pub path: String,
    #[serde(default)]
    pub mode: WriteMode,
    pub tpl: Value,
}
