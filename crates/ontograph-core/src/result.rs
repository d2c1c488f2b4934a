//! Query results and the metadata attached to them.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::value::{DataType, GraphValue};

/// Result of an ad-hoc query.
///
/// `truncated` is true iff more rows matched than the limit allowed; in that
/// case `row_count` equals the limit, not the true match count.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<GraphValue>>,
    pub row_count: usize,
    pub truncated: bool,
    pub metadata: Vec<ColumnMetadata>,
    pub pattern: QueryPattern,
}

impl QueryResult {
    /// Value at (row, column name).
    pub fn value(&self, row: usize, column: &str) -> Option<&GraphValue> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }

    pub fn column_metadata(&self, column: &str) -> Option<&ColumnMetadata> {
        self.metadata.iter().find(|m| m.name == column)
    }
}

/// Semantic description of one result column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMetadata {
    pub name: String,
    pub data_type: DataType,
    pub description: Option<String>,
    pub is_identifier: bool,
    pub example_values: Option<Vec<String>>,
    pub required: bool,
}

impl ColumnMetadata {
    /// Skeleton entry: `String`, no description, not required.
    pub fn skeleton(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: DataType::String,
            description: None,
            is_identifier: false,
            example_values: None,
            required: false,
        }
    }
}

// ── Pattern Analysis ──────────────────────────────────────────────

/// What one result row represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RowGrain {
    PerNode,
    PerRelationship,
    Aggregate,
    Unknown,
}

/// How a single result column was produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ColumnKind {
    /// A whole node bound in a node pattern.
    Node {
        variable: String,
        labels: Vec<String>,
    },
    /// A whole relationship bound in a relationship pattern.
    Relationship {
        variable: String,
        types: Vec<String>,
    },
    /// A named path.
    Path { variable: String },
    /// `variable.property`, with the labels bound to `variable`.
    Property {
        variable: String,
        property: String,
        labels: Vec<String>,
    },
    /// An aggregate function call such as `count(n)`.
    Aggregate { function: String },
    /// Any other scalar expression.
    Expression,
    /// The column could not be traced back to the query text.
    Unknown,
}

impl ColumnKind {
    pub fn is_node(&self) -> bool {
        matches!(self, Self::Node { .. })
    }

    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Self::Property { .. } | Self::Aggregate { .. } | Self::Expression
        )
    }
}

/// Classification of one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnPattern {
    pub name: String,
    pub kind: ColumnKind,
}

/// Everything the analyzer could infer from the query text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryPattern {
    pub grain: RowGrain,
    pub node_labels: BTreeSet<String>,
    pub relationship_types: BTreeSet<String>,
    pub columns: Vec<ColumnPattern>,
    pub distinct: bool,
    pub is_write: bool,
    /// True when the text could not be fully classified.
    pub unknown: bool,
}

impl QueryPattern {
    /// The degraded pattern: every column unknown.
    pub fn unknown(columns: &[String]) -> Self {
        Self {
            grain: RowGrain::Unknown,
            node_labels: BTreeSet::new(),
            relationship_types: BTreeSet::new(),
            columns: columns
                .iter()
                .map(|c| ColumnPattern {
                    name: c.clone(),
                    kind: ColumnKind::Unknown,
                })
                .collect(),
            distinct: false,
            is_write: false,
            unknown: true,
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnKind> {
        self.columns.iter().find(|c| c.name == name).map(|c| &c.kind)
    }

    /// Names of columns holding whole nodes.
    pub fn node_columns(&self) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .filter(|c| c.kind.is_node())
            .map(|c| c.name.as_str())
    }
}
