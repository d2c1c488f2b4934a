//! Core domain types for the Ontograph graph-access layer.
//!
//! Identifiers, the relational records the access layer reads, and the
//! semantic catalog shapes shared by the executor, enricher, and schema
//! aggregator.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;
use crate::value::DataType;

// ── Identifiers ───────────────────────────────────────────────────

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim())
                    .map(Self)
                    .map_err(|e| CoreError::InvalidId {
                        kind: stringify!($name),
                        value: s.to_string(),
                        reason: e.to_string(),
                    })
            }
        }
    };
}

uuid_id!(
    /// Top-level isolation boundary. Every ontology, workspace, and
    /// credential belongs to exactly one tenant.
    TenantId
);

uuid_id!(
    /// A tenant-owned graph domain, optionally bound to its own database.
    OntologyId
);

uuid_id!(
    /// A user workspace, optionally associated with one ontology.
    WorkspaceId
);

// ── Relational Records ────────────────────────────────────────────

/// Per-ontology graph database credentials as persisted.
///
/// `encrypted_password` is an opaque vault blob; the plaintext is never
/// stored on this type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OntologyGraphConnection {
    pub ontology_id: OntologyId,
    pub uri: String,
    pub username: String,
    #[serde(default)]
    pub encrypted_password: Option<String>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

/// An ontology row: its owner and its optional connection override.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OntologyRecord {
    pub id: OntologyId,
    pub tenant_id: TenantId,
    pub name: String,
    #[serde(default)]
    pub connection: Option<OntologyGraphConnection>,
}

/// The slice of a workspace row the access layer needs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkspaceRecord {
    pub id: WorkspaceId,
    pub tenant_id: TenantId,
    #[serde(default)]
    pub ontology_id: Option<OntologyId>,
}

// ── Semantic Catalog ──────────────────────────────────────────────

/// Curated description of one node label.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SemanticEntity {
    pub node_label: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub fields: Vec<SemanticField>,
}

impl SemanticEntity {
    /// Find a field by exact name, falling back to a case-insensitive match.
    pub fn field(&self, name: &str) -> Option<&SemanticField> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .or_else(|| self.fields.iter().find(|f| f.name.eq_ignore_ascii_case(name)))
    }
}

/// Curated description of one property on a node label.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SemanticField {
    pub name: String,
    #[serde(default)]
    pub data_type: DataType,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_identifier: bool,
    #[serde(default)]
    pub required: bool,
}

/// Curated description of one relationship type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SemanticRelation {
    pub rel_type: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// A tenant's whole catalog, as read in one go by the enricher and aggregator.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SemanticCatalogSnapshot {
    #[serde(default)]
    pub entities: Vec<SemanticEntity>,
    #[serde(default)]
    pub relations: Vec<SemanticRelation>,
}

impl SemanticCatalogSnapshot {
    /// Entity for a node label (exact match first, then case-insensitive).
    pub fn entity(&self, label: &str) -> Option<&SemanticEntity> {
        self.entities
            .iter()
            .find(|e| e.node_label == label)
            .or_else(|| {
                self.entities
                    .iter()
                    .find(|e| e.node_label.eq_ignore_ascii_case(label))
            })
    }

    /// First entity matching any of the given labels, in label order.
    pub fn entity_for_labels<'a>(
        &'a self,
        labels: impl IntoIterator<Item = &'a String>,
    ) -> Option<&'a SemanticEntity> {
        labels.into_iter().find_map(|l| self.entity(l))
    }

    pub fn relation(&self, rel_type: &str) -> Option<&SemanticRelation> {
        self.relations.iter().find(|r| r.rel_type == rel_type)
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.relations.is_empty()
    }
}
