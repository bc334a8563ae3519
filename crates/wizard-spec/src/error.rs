use std::path::PathBuf;

use thiserror::Error;

/// Schema authoring defects. The engine cannot trust the schema when one of
/// these is raised, so they always abort the current operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("API '{0}' not found in schema")]
    UnknownApi(String),
    #[error("unknown mapper strategy '{0}'")]
    UnknownStrategy(String),
    #[error("custom mapper '{0}' is not registered")]
    UnknownCustomMapper(String),
    #[error("invalid parameters for mapper '{strategy}': {message}")]
    InvalidMapperParams { strategy: String, message: String },
    #[error("invalid output path '{0}'")]
    InvalidOutputPath(String),
    #[error("output path '{path}' conflicts with existing {found} at '{segment}'")]
    PathConflict {
        path: String,
        segment: String,
        found: &'static str,
    },
}

/// Failures talking to an external lookup API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    #[error("[{api}] request failed: {message}")]
    Transport { api: String, message: String },
    #[error("[{api}] request timed out")]
    Timeout { api: String },
    #[error("[{api}] API returned {status}")]
    Status { api: String, status: u16 },
    #[error("[{api}] invalid response body: {message}")]
    InvalidBody { api: String, message: String },
}

impl UpstreamError {
    pub fn api(&self) -> &str {
        match self {
            UpstreamError::Transport { api, .. }
            | UpstreamError::Timeout { api }
            | UpstreamError::Status { api, .. }
            | UpstreamError::InvalidBody { api, .. } => api,
        }
    }
}

/// A single raw upstream entry that could not be normalized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot map {strategy} entry: {reason}")]
pub struct MapError {
    pub strategy: &'static str,
    pub reason: String,
}

impl MapError {
    pub(crate) fn new(strategy: &'static str, reason: impl Into<String>) -> Self {
        Self {
            strategy,
            reason: reason.into(),
        }
    }
}

/// Errors surfaced by engine operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

/// Schema loading failures; fatal at startup.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("failed to read schema {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse schema: {0}")]
    Parse(#[from] serde_json::Error),
}
