use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_true() -> bool {
    true
}

fn default_user_agent() -> String {
    format!("metadata-wizard/{}", env!("CARGO_PKG_VERSION"))
}

/// Process-wide engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct EngineConfig {
    /// Upstream timeout used when an API does not set `timeout_ms`.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Honour `HTTP_PROXY` / `HTTPS_PROXY` from the environment.
    #[serde(default = "default_true")]
    pub use_system_proxy: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            user_agent: default_user_agent(),
            use_system_proxy: true,
        }
    }
}

impl EngineConfig {
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn without_system_proxy(mut self) -> Self {
        self.use_system_proxy = false;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
