//! ontograph-core: Shared types, configuration, and error handling for the
//! Ontograph graph-access layer.
//!
//! This crate provides the foundational types used across all Ontograph components:
//! - Tenant, ontology, and workspace identifiers and relational records
//! - The `GraphValue` tagged union and semantic `DataType`
//! - Query results, column metadata, and pattern classifications
//! - The aggregated graph schema and semantic catalog shapes
//! - Configuration management
//! - Common error types

pub mod config;
pub mod error;
pub mod result;
pub mod schema;
pub mod types;
pub mod value;

pub use error::CoreError;
pub use result::{ColumnKind, ColumnMetadata, ColumnPattern, QueryPattern, QueryResult, RowGrain};
pub use schema::{
    Cardinality, GraphSchema, NodeTypeSchema, PropertySource, RelationshipTypeSchema,
    SchemaProperty,
};
pub use types::{
    OntologyGraphConnection, OntologyId, OntologyRecord, SemanticCatalogSnapshot, SemanticEntity,
    SemanticField, SemanticRelation, TenantId, WorkspaceId, WorkspaceRecord,
};
pub use value::{DataType, GraphNode, GraphRelationship, GraphValue};
