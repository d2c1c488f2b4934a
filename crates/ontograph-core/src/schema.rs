//! Aggregated graph schema, rebuilt per request from live introspection and
//! the semantic catalog.

use serde::{Deserialize, Serialize};

use crate::value::DataType;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphSchema {
    pub node_types: Vec<NodeTypeSchema>,
    pub relationship_types: Vec<RelationshipTypeSchema>,
    pub suggested_patterns: Vec<String>,
}

impl GraphSchema {
    pub fn node_type(&self, label: &str) -> Option<&NodeTypeSchema> {
        self.node_types.iter().find(|n| n.label == label)
    }

    pub fn relationship_type(&self, rel_type: &str) -> Option<&RelationshipTypeSchema> {
        self.relationship_types
            .iter()
            .find(|r| r.rel_type == rel_type)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeTypeSchema {
    pub label: String,
    pub description: Option<String>,
    pub count: i64,
    pub properties: Vec<SchemaProperty>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipTypeSchema {
    #[serde(rename = "type")]
    pub rel_type: String,
    pub description: Option<String>,
    pub from_labels: Vec<String>,
    pub to_labels: Vec<String>,
    pub cardinality: Cardinality,
    pub properties: Option<Vec<SchemaProperty>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaProperty {
    pub name: String,
    pub data_type: DataType,
    pub description: Option<String>,
    pub required: bool,
    pub is_identifier: bool,
    pub source: PropertySource,
}

/// Where a schema property definition came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertySource {
    Catalog,
    Introspection,
}

/// Relationship cardinality. Only `ManyToMany` is currently produced; the
/// graph offers no cheap signal for the others.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Cardinality {
    OneToOne,
    OneToMany,
    ManyToOne,
    #[default]
    ManyToMany,
}
