//! Error taxonomy of the graph-access layer.
//!
//! Validation and not-found errors are safe to show callers verbatim.
//! Connection, secret, and internal errors keep their detail for server-side
//! logs and render a generic message.

use thiserror::Error;

use ontograph_graph::GraphError;
use ontograph_vault::SecretError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AccessError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Graph database is unavailable")]
    GraphConnection { detail: String },

    #[error("Query failed: {0}")]
    QueryExecution(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Stored graph credentials could not be used")]
    Secret(#[from] SecretError),

    #[error("Internal error")]
    Internal { detail: String },

    #[error("Operation cancelled")]
    Cancelled,
}

impl AccessError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::Internal {
            detail: detail.into(),
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::GraphConnection { .. } => "GRAPH_CONNECTION_ERROR",
            Self::QueryExecution(_) => "QUERY_EXECUTION_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Secret(_) => "SECRET_ERROR",
            Self::Internal { .. } => "INTERNAL",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Message suitable for callers. Never contains credentials or driver
    /// detail for connection and secret failures.
    pub fn public_message(&self) -> String {
        self.to_string()
    }

    /// Full detail for server-side logs.
    pub fn detail(&self) -> String {
        match self {
            Self::GraphConnection { detail } | Self::Internal { detail } => detail.clone(),
            Self::Secret(e) => e.to_string(),
            other => other.to_string(),
        }
    }

    /// Log at a level matching the error's severity, then hand it back.
    pub fn logged(self, operation: &'static str) -> Self {
        match &self {
            Self::GraphConnection { .. } | Self::Secret(_) | Self::Internal { .. } => {
                tracing::error!(operation, code = self.code(), detail = %self.detail(), "Graph access failed");
            }
            Self::QueryExecution(_) => {
                tracing::warn!(operation, code = self.code(), detail = %self.detail(), "Query rejected by database");
            }
            _ => {
                tracing::debug!(operation, code = self.code(), message = %self, "Request rejected");
            }
        }
        self
    }
}

impl From<GraphError> for AccessError {
    fn from(err: GraphError) -> Self {
        match err {
            GraphError::Connection(detail) | GraphError::Authentication(detail) => {
                Self::GraphConnection { detail }
            }
            GraphError::Query(message) => Self::QueryExecution(message),
            GraphError::NotFound { label, id } => Self::NotFound {
                kind: "node",
                id: format!("{label}:{id}"),
            },
            GraphError::Serialization(detail) => Self::Internal { detail },
            GraphError::Cancelled => Self::Cancelled,
        }
    }
}

pub type Result<T> = std::result::Result<T, AccessError>;
