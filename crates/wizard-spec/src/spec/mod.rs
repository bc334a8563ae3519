pub mod api;
pub mod document;
pub mod output;

pub use api::{ApiDescriptor, HttpMethod, MapperSpec};
pub use document::{FieldSpec, FieldType, SchemaDocument, SectionSpec};
pub use output::{OutputDescriptor, WriteMode};
