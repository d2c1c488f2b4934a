//! Read operations and introspection queries for an ontology's graph.
//!
//! Every statement here is fixed text; caller input only reaches Cypher as
//! parameters or as escaped identifiers.

use std::collections::{BTreeMap, BTreeSet};

use ontograph_core::GraphValue;

use crate::client::{GraphClient, GraphError, RowRef, RowSet};
use crate::cypher::{escape_identifier, statement};

/// A lightweight record returned from node queries.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct NodeRecord {
    /// The `id` property, or the internal node id when the property is absent.
    pub id: String,
    pub labels: Vec<String>,
    pub properties: BTreeMap<String, GraphValue>,
}

impl NodeRecord {
    pub fn label(&self) -> &str {
        self.labels.first().map(String::as_str).unwrap_or_default()
    }
}

/// A lightweight record returned from relationship queries.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct EdgeRecord {
    pub edge_type: String,
    pub source_id: String,
    pub target_id: String,
    pub properties: BTreeMap<String, GraphValue>,
}

/// A neighbor result: node + the connecting edge.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Neighbor {
    pub node: NodeRecord,
    pub edge: EdgeRecord,
}

/// One property as reported by the database's schema procedures.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct PropertyMetadata {
    pub name: String,
    /// Neo4j type names, e.g. `String`, `Long`, `StringArray`.
    pub types: Vec<String>,
    pub mandatory: bool,
}

/// Endpoint labels observed for one relationship type.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct RelationshipEndpoints {
    pub from_labels: BTreeSet<String>,
    pub to_labels: BTreeSet<String>,
    /// Observed (from label, to label) pairs.
    pub pairs: BTreeSet<(String, String)>,
}

impl GraphClient {
    // ── Single Node Lookups ──────────────────────────────────────

    /// Get a node by its `id` property, optionally restricted to a label.
    pub async fn get_node_by_id(
        &self,
        label: Option<&str>,
        node_id: &str,
    ) -> Result<NodeRecord, GraphError> {
        let pattern = label_pattern(label);
        let q = statement(format!(
            "MATCH (n{pattern} {{id: $id}})
             RETURN n LIMIT 1"
        ))
        .param("id", node_id);

        let rows = self.query_one(q).await?;
        match rows.first() {
            Some(row) => node_from_column(&row, "n"),
            None => Err(GraphError::NotFound {
                label: label.unwrap_or("*").to_string(),
                id: node_id.to_string(),
            }),
        }
    }

    /// Get a node by a property lookup.
    pub async fn find_node_by_property(
        &self,
        label: &str,
        property: &str,
        value: impl Into<GraphValue>,
    ) -> Result<Option<NodeRecord>, GraphError> {
        let label = escape_identifier(label);
        let property = escape_identifier(property);
        let q = statement(format!(
            "MATCH (n:{label})
             WHERE n.{property} = $value
             RETURN n LIMIT 1"
        ))
        .param("value", value);

        let rows = self.query_one(q).await?;
        rows.first().map(|row| node_from_column(&row, "n")).transpose()
    }

    // ── List Queries ─────────────────────────────────────────────

    /// List nodes carrying a label.
    pub async fn get_nodes_by_type(
        &self,
        label: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<NodeRecord>, GraphError> {
        let label = escape_identifier(label);
        let q = statement(format!(
            "MATCH (n:{label})
             RETURN n
             SKIP $offset LIMIT $limit"
        ))
        .param("limit", limit as i64)
        .param("offset", offset as i64);

        let rows = self.query_rows(q).await?;
        rows.iter().map(|row| node_from_column(&row, "n")).collect()
    }

    /// Count nodes carrying a label. Served from the count store, so cheap.
    pub async fn get_node_count(&self, label: &str) -> Result<i64, GraphError> {
        let label = escape_identifier(label);
        let q = statement(format!(
            "MATCH (n:{label})
             RETURN count(n) AS cnt"
        ));

        let rows = self.query_one(q).await?;
        Ok(rows.first().and_then(|r| r.get_i64("cnt")).unwrap_or(0))
    }

    // ── Neighbor Queries ─────────────────────────────────────────

    /// Get all neighbors of a node (any direction, any relationship type).
    pub async fn get_neighbors(
        &self,
        node_id: &str,
        limit: u32,
    ) -> Result<Vec<Neighbor>, GraphError> {
        let q = statement(
            "MATCH (a {id: $id})-[r]-(b)
             RETURN b, type(r) AS rel_type, startNode(r) = a AS outgoing,
                    properties(r) AS rel_props
             LIMIT $limit",
        )
        .param("id", node_id)
        .param("limit", limit as i64);

        let rows = self.query_rows(q).await?;
        let mut results = Vec::with_capacity(rows.len());

        for row in rows.iter() {
            let node = node_from_column(&row, "b")?;
            let outgoing = row
                .get("outgoing")
                .and_then(GraphValue::as_bool)
                .unwrap_or(true);
            let (source_id, target_id) = if outgoing {
                (node_id.to_string(), node.id.clone())
            } else {
                (node.id.clone(), node_id.to_string())
            };

            let edge = EdgeRecord {
                edge_type: row.get_str("rel_type").unwrap_or_default().to_string(),
                source_id,
                target_id,
                properties: row
                    .get("rel_props")
                    .and_then(GraphValue::properties)
                    .cloned()
                    .unwrap_or_default(),
            };

            results.push(Neighbor { node, edge });
        }

        Ok(results)
    }

    // ── Introspection ────────────────────────────────────────────

    /// All node labels in the database.
    pub async fn get_node_types(&self) -> Result<Vec<String>, GraphError> {
        let q = statement(
            "CALL db.labels() YIELD label
             RETURN label ORDER BY label",
        );
        let rows = self.query_rows(q).await?;
        Ok(strings_in(&rows, "label"))
    }

    /// All relationship types in the database.
    pub async fn get_edge_types(&self) -> Result<Vec<String>, GraphError> {
        let q = statement(
            "CALL db.relationshipTypes() YIELD relationshipType
             RETURN relationshipType ORDER BY relationshipType",
        );
        let rows = self.query_rows(q).await?;
        Ok(strings_in(&rows, "relationshipType"))
    }

    /// Property metadata for one node label.
    pub async fn get_node_property_metadata(
        &self,
        label: &str,
    ) -> Result<Vec<PropertyMetadata>, GraphError> {
        let q = statement(
            "CALL db.schema.nodeTypeProperties()
             YIELD nodeLabels, propertyName, propertyTypes, mandatory
             WITH nodeLabels, propertyName, propertyTypes, mandatory
             WHERE $label IN nodeLabels AND propertyName IS NOT NULL
             RETURN propertyName, propertyTypes, mandatory
             ORDER BY propertyName",
        )
        .param("label", label);

        let rows = self.query_rows(q).await?;
        Ok(property_metadata(&rows))
    }

    /// Property metadata for one relationship type.
    pub async fn get_relationship_property_metadata(
        &self,
        rel_type: &str,
    ) -> Result<Vec<PropertyMetadata>, GraphError> {
        let q = statement(
            "CALL db.schema.relTypeProperties()
             YIELD relType, propertyName, propertyTypes, mandatory
             WITH relType, propertyName, propertyTypes, mandatory
             WHERE relType = $rel_type AND propertyName IS NOT NULL
             RETURN propertyName, propertyTypes, mandatory
             ORDER BY propertyName",
        )
        .param("rel_type", format!(":{}", escape_identifier(rel_type)));

        let rows = self.query_rows(q).await?;
        Ok(property_metadata(&rows))
    }

    /// Endpoint labels of a relationship type, observed over a sample of at
    /// most `sample_size` relationships.
    pub async fn get_relationship_type_endpoints(
        &self,
        rel_type: &str,
        sample_size: usize,
    ) -> Result<RelationshipEndpoints, GraphError> {
        let rel = escape_identifier(rel_type);
        let q = statement(format!(
            "MATCH (a)-[r:{rel}]->(b)
             WITH labels(a) AS from_labels, labels(b) AS to_labels
             LIMIT $sample
             RETURN DISTINCT from_labels, to_labels"
        ))
        .param("sample", sample_size as i64);

        let rows = self.query_rows(q).await?;
        let mut endpoints = RelationshipEndpoints::default();
        for row in rows.iter() {
            let from = row.get_strings("from_labels");
            let to = row.get_strings("to_labels");
            for f in &from {
                for t in &to {
                    endpoints.pairs.insert((f.clone(), t.clone()));
                }
            }
            endpoints.from_labels.extend(from);
            endpoints.to_labels.extend(to);
        }
        Ok(endpoints)
    }
}

/// `:Label` for an optional label, escaped.
fn label_pattern(label: Option<&str>) -> String {
    label
        .map(|l| format!(":{}", escape_identifier(l)))
        .unwrap_or_default()
}

fn strings_in(rows: &RowSet, column: &str) -> Vec<String> {
    rows.iter()
        .filter_map(|r| r.get_str(column).map(str::to_string))
        .collect()
}

/// Schema procedures report one row per label set (or relationship type) a
/// property appears on. Rows for the same property are merged: types are
/// unioned and the property is mandatory only when every row says so.
fn property_metadata(rows: &RowSet) -> Vec<PropertyMetadata> {
    let mut merged: Vec<PropertyMetadata> = Vec::new();
    for row in rows.iter() {
        let Some(name) = row.get_str("propertyName") else {
            continue;
        };
        let types = row.get_strings("propertyTypes");
        let mandatory = row
            .get("mandatory")
            .and_then(GraphValue::as_bool)
            .unwrap_or(false);

        match merged.iter_mut().find(|p| p.name == name) {
            Some(existing) => {
                for t in types {
                    if !existing.types.contains(&t) {
                        existing.types.push(t);
                    }
                }
                existing.mandatory &= mandatory;
            }
            None => merged.push(PropertyMetadata {
                name: name.to_string(),
                types,
                mandatory,
            }),
        }
    }
    merged
}

/// Convert a node-valued column into a [`NodeRecord`].
pub(crate) fn node_from_column(row: &RowRef<'_>, column: &str) -> Result<NodeRecord, GraphError> {
    match row.get(column) {
        Some(GraphValue::Node(node)) => {
            let id = node
                .properties
                .get("id")
                .map(GraphValue::render)
                .unwrap_or_else(|| node.id.to_string());
            Ok(NodeRecord {
                id,
                labels: node.labels.clone(),
                properties: node.properties.clone(),
            })
        }
        Some(other) => Err(GraphError::Serialization(format!(
            "column {column} is not a node: {}",
            other.render()
        ))),
        None => Err(GraphError::Serialization(format!(
            "column {column} missing from result"
        ))),
    }
}
