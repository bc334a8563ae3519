#![allow(missing_docs)]

pub mod condition;
pub mod config;
pub mod error;
pub mod mapper;
pub mod output;
pub mod path;
pub mod search;
pub mod spec;
pub mod state;
pub mod template;
pub mod transport;
pub mod update;
pub mod validate;
pub mod visibility;

pub use condition::{Condition, visible};
pub use config::EngineConfig;
pub use error::{ConfigurationError, EngineError, MapError, SchemaError, UpstreamError};
pub use mapper::{CandidateRecord, Mapper};
pub use output::{apply, materialize};
pub use path::{get, substitute};
pub use search::Engine;
pub use spec::{
    ApiDescriptor, FieldSpec, FieldType, HttpMethod, MapperSpec, OutputDescriptor, SchemaDocument,
    SectionSpec, WriteMode,
};
pub use state::FormState;
pub use transport::{HttpTransport, Transport, UpstreamRequest};
pub use update::{UpdateStatus, check_update};
pub use validate::{DiagnosticReport, SchemaIssue, diagnose};
pub use visibility::{VisibilityMap, resolve_visibility, visible_in};

/// JSON Schema describing the schema document format.
pub fn document_json_schema() -> serde_json::Value {
    serde_json::to_value(schemars::schema_for!(SchemaDocument)).unwrap_or_default()
}
