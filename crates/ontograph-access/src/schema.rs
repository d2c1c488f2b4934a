//! Live graph schema assembled per request.
//!
//! Labels and relationship types are introspected with bounded concurrency.
//! A failure for one label or type drops that entry and the rest of the
//! schema is still returned. Cancellation is never swallowed.

use std::collections::BTreeSet;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use ontograph_core::config::SchemaSettings;
use ontograph_core::{
    Cardinality, DataType, GraphSchema, NodeTypeSchema, PropertySource, RelationshipTypeSchema,
    SchemaProperty, SemanticCatalogSnapshot, SemanticField,
};
use ontograph_graph::{GraphClient, GraphError, PropertyMetadata};

use crate::enricher::looks_like_identifier;
use crate::error::{AccessError, Result};

pub struct SchemaAggregator {
    settings: SchemaSettings,
}

impl SchemaAggregator {
    pub fn new(settings: SchemaSettings) -> Self {
        Self { settings }
    }

    pub async fn aggregate(
        &self,
        client: &GraphClient,
        catalog: &SemanticCatalogSnapshot,
    ) -> Result<GraphSchema> {
        let started = Instant::now();
        let concurrency = self.settings.concurrency.max(1);

        let mut labels = listing(client.get_node_types().await, "labels")?;
        labels.sort();
        labels.dedup();
        let mut rel_types = listing(client.get_edge_types().await, "relationship types")?;
        rel_types.sort();
        rel_types.dedup();

        let node_results: Vec<_> = stream::iter(
            labels
                .iter()
                .map(|label| node_type(client, label, catalog)),
        )
        .buffered(concurrency)
        .collect()
        .await;

        let mut node_types = Vec::with_capacity(node_results.len());
        for (label, result) in labels.iter().zip(node_results) {
            match result {
                Ok(node) => node_types.push(node),
                Err(GraphError::Cancelled) => return Err(AccessError::Cancelled),
                Err(e) => warn!(%label, error = %e, "Skipping label in schema"),
            }
        }

        let sample_size = self.settings.endpoint_sample_size.max(1);
        let rel_results: Vec<_> = stream::iter(
            rel_types
                .iter()
                .map(|rel_type| relationship_type(client, rel_type, sample_size, catalog)),
        )
        .buffered(concurrency)
        .collect()
        .await;

        let mut relationship_types = Vec::with_capacity(rel_results.len());
        let mut patterns = BTreeSet::new();
        for (rel_type, result) in rel_types.iter().zip(rel_results) {
            match result {
                Ok((schema, pairs)) => {
                    for (from, to) in pairs {
                        patterns.insert(format!("(:{from})-[:{rel_type}]->(:{to})"));
                    }
                    relationship_types.push(schema);
                }
                Err(GraphError::Cancelled) => return Err(AccessError::Cancelled),
                Err(e) => warn!(%rel_type, error = %e, "Skipping relationship type in schema"),
            }
        }

        info!(
            node_types = node_types.len(),
            relationship_types = relationship_types.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Graph schema assembled"
        );

        Ok(GraphSchema {
            node_types,
            relationship_types,
            suggested_patterns: patterns.into_iter().collect(),
        })
    }
}

/// An enumeration that failed yields nothing rather than failing the schema.
fn listing(result: std::result::Result<Vec<String>, GraphError>, what: &str) -> Result<Vec<String>> {
    match result {
        Ok(items) => Ok(items),
        Err(GraphError::Cancelled) => Err(AccessError::Cancelled),
        Err(e) => {
            warn!(error = %e, "Could not enumerate {what}; schema will omit them");
            Ok(Vec::new())
        }
    }
}

async fn node_type(
    client: &GraphClient,
    label: &str,
    catalog: &SemanticCatalogSnapshot,
) -> std::result::Result<NodeTypeSchema, GraphError> {
    let count = client.get_node_count(label).await?;
    let entity = catalog.entity(label);

    let properties = match entity.filter(|e| !e.fields.is_empty()) {
        Some(entity) => entity.fields.iter().map(catalog_property).collect(),
        None => client
            .get_node_property_metadata(label)
            .await?
            .iter()
            .map(introspected_property)
            .collect(),
    };

    Ok(NodeTypeSchema {
        label: label.to_string(),
        description: entity.and_then(|e| e.description.clone()),
        count,
        properties,
    })
}

async fn relationship_type(
    client: &GraphClient,
    rel_type: &str,
    sample_size: usize,
    catalog: &SemanticCatalogSnapshot,
) -> std::result::Result<(RelationshipTypeSchema, BTreeSet<(String, String)>), GraphError> {
    let endpoints = client
        .get_relationship_type_endpoints(rel_type, sample_size)
        .await?;

    let properties = match client.get_relationship_property_metadata(rel_type).await {
        Ok(props) if props.is_empty() => None,
        Ok(props) => Some(props.iter().map(introspected_property).collect()),
        Err(GraphError::Cancelled) => return Err(GraphError::Cancelled),
        Err(e) => {
            warn!(%rel_type, error = %e, "Relationship properties unavailable");
            None
        }
    };

    let schema = RelationshipTypeSchema {
        rel_type: rel_type.to_string(),
        description: catalog.relation(rel_type).and_then(|r| r.description.clone()),
        from_labels: endpoints.from_labels.into_iter().collect(),
        to_labels: endpoints.to_labels.into_iter().collect(),
        cardinality: Cardinality::ManyToMany,
        properties,
    };
    Ok((schema, endpoints.pairs))
}

fn catalog_property(field: &SemanticField) -> SchemaProperty {
    SchemaProperty {
        name: field.name.clone(),
        data_type: field.data_type,
        description: field.description.clone(),
        required: field.required,
        is_identifier: field.is_identifier || looks_like_identifier(&field.name),
        source: PropertySource::Catalog,
    }
}

fn introspected_property(meta: &PropertyMetadata) -> SchemaProperty {
    SchemaProperty {
        name: meta.name.clone(),
        data_type: meta
            .types
            .first()
            .map(|t| DataType::from_neo4j_type(t))
            .unwrap_or_default(),
        description: None,
        required: meta.mandatory,
        is_identifier: looks_like_identifier(&meta.name),
        source: PropertySource::Introspection,
    }
}
