//! Ontograph Access: tenant-scoped access to ontology graphs.
//!
//! [`GraphAccessService`] is the entry point. It resolves a graph client per
//! ontology or workspace through a per-key [`ConnectionCache`], runs
//! validated free-text queries with type-enriched results, and assembles the
//! live schema of a graph overlaid with the tenant's semantic catalog.

pub mod analyzer;
pub mod cache;
pub mod enricher;
pub mod error;
pub mod executor;
pub mod lexer;
pub mod resolver;
pub mod schema;
pub mod service;
pub mod store;
pub mod validate;

pub use cache::{CacheKey, CachedClient, ClientFactory, ConnectionCache, ConnectionSpec, Neo4jConnector};
pub use error::{AccessError, Result};
pub use executor::{ExecutionPlan, QueryExecutor};
pub use resolver::{ConnectionResolver, Scope};
pub use schema::SchemaAggregator;
pub use service::{GraphAccessService, Stores};
pub use store::{ConnectionStore, MemoryStore, Registry, SemanticCatalog, TenantCatalog, WorkspaceDirectory};
