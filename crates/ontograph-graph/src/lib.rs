//! Ontograph Graph: Neo4j client for ontology graphs.
//!
//! All graph reads and writes flow through [`GraphClient`]. Typed operations
//! build fixed Cypher internally; free-text execution goes through
//! [`GraphClient::fetch`] and is policed by the access layer.

pub mod client;
pub mod cypher;
pub mod mutations;
pub mod queries;
pub mod testing;
pub mod value;

pub use client::{GraphClient, GraphConfig, GraphDriver, GraphError, Neo4jDriver, RowRef, RowSet};
pub use cypher::{escape_identifier, statement, Statement};
pub use mutations::{EdgeUpsert, NodeUpsert};
pub use queries::{EdgeRecord, Neighbor, NodeRecord, PropertyMetadata, RelationshipEndpoints};
