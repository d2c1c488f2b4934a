//! Write operations for the knowledge graph.
//!
//! All mutations use MERGE (upsert) semantics so re-imports are idempotent.
//! Nodes are identified by (label, `id` property).

use std::collections::BTreeMap;

use chrono::Utc;

use ontograph_core::GraphValue;

use crate::client::{GraphClient, GraphError};
use crate::cypher::{escape_identifier, statement};

/// A node to create or update.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeUpsert {
    pub label: String,
    pub id: String,
    pub properties: BTreeMap<String, GraphValue>,
}

/// A relationship to create or update between two existing nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeUpsert {
    pub rel_type: String,
    pub source_id: String,
    pub target_id: String,
    pub properties: BTreeMap<String, GraphValue>,
}

impl GraphClient {
    // ── Node Upserts ─────────────────────────────────────────────

    /// Upsert a node. `created_at` is set once; `updated_at` on every write.
    pub async fn upsert_node(&self, node: &NodeUpsert) -> Result<(), GraphError> {
        let label = escape_identifier(&node.label);
        let q = statement(format!(
            "MERGE (n:{label} {{id: $id}})
             ON CREATE SET n += $props, n.created_at = $now, n.updated_at = $now
             ON MATCH SET n += $props, n.updated_at = $now"
        ))
        .param("id", node.id.as_str())
        .param("props", props_param(&node.properties))
        .param("now", Utc::now().to_rfc3339());

        self.run(q).await
    }

    /// Delete a node and its relationships.
    pub async fn delete_node(&self, label: &str, node_id: &str) -> Result<(), GraphError> {
        let label = escape_identifier(label);
        let q = statement(format!("MATCH (n:{label} {{id: $id}}) DETACH DELETE n"))
            .param("id", node_id);

        self.run(q).await
    }

    // ── Edge Upserts ─────────────────────────────────────────────

    /// Upsert a relationship. Fails with `NotFound` when either endpoint is
    /// missing, rather than silently writing nothing.
    pub async fn upsert_edge(&self, edge: &EdgeUpsert) -> Result<(), GraphError> {
        let rel_type = escape_identifier(&edge.rel_type);
        let q = statement(format!(
            "MATCH (a {{id: $source_id}})
             MATCH (b {{id: $target_id}})
             MERGE (a)-[r:{rel_type}]->(b)
             ON CREATE SET r += $props, r.created_at = $now, r.updated_at = $now
             ON MATCH SET r += $props, r.updated_at = $now
             RETURN count(r) AS merged"
        ))
        .param("source_id", edge.source_id.as_str())
        .param("target_id", edge.target_id.as_str())
        .param("props", props_param(&edge.properties))
        .param("now", Utc::now().to_rfc3339());

        let rows = self.query_one(q).await?;
        let merged = rows.first().and_then(|r| r.get_i64("merged")).unwrap_or(0);
        if merged == 0 {
            return Err(GraphError::NotFound {
                label: edge.rel_type.clone(),
                id: format!("{} -> {}", edge.source_id, edge.target_id),
            });
        }
        Ok(())
    }
}

/// Property map parameter; the identity key is never overwritten.
fn props_param(properties: &BTreeMap<String, GraphValue>) -> GraphValue {
    GraphValue::Map(
        properties
            .iter()
            .filter(|(k, _)| k.as_str() != "id")
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
    )
}
