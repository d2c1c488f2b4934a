//! Column metadata for query results.
//!
//! Two passes, always in this order: a sample pass that types each column
//! from the first row, then a catalog overlay that replaces sampled types
//! and descriptions with the tenant's curated definitions. The catalog wins.

use std::collections::BTreeSet;

use ontograph_core::{
    ColumnKind, ColumnMetadata, DataType, GraphValue, QueryPattern, SemanticCatalogSnapshot,
    SemanticEntity,
};

const MAX_EXAMPLES: usize = 3;

/// Heuristic for key-like names: `id`, `patient_id`, `patientId`.
pub fn looks_like_identifier(name: &str) -> bool {
    name.eq_ignore_ascii_case("id")
        || name.to_ascii_lowercase().ends_with("_id")
        || (name.len() > 2 && name.ends_with("Id"))
}

pub struct TypeEnricher {
    sample_rows: usize,
}

impl TypeEnricher {
    pub fn new(sample_rows: usize) -> Self {
        Self { sample_rows }
    }

    pub fn enrich(
        &self,
        pattern: &QueryPattern,
        columns: &[String],
        rows: &[Vec<GraphValue>],
        catalog: &SemanticCatalogSnapshot,
    ) -> Vec<ColumnMetadata> {
        let mut metadata: Vec<ColumnMetadata> = columns
            .iter()
            .map(|name| {
                let mut meta = ColumnMetadata::skeleton(name.as_str());
                let key = match pattern.column(name) {
                    Some(ColumnKind::Property { property, .. }) => property.as_str(),
                    _ => name.as_str(),
                };
                meta.is_identifier = looks_like_identifier(key);
                meta
            })
            .collect();

        self.sample(&mut metadata, rows);
        overlay(&mut metadata, pattern, catalog);
        metadata
    }

    fn sample(&self, metadata: &mut [ColumnMetadata], rows: &[Vec<GraphValue>]) {
        let Some(first) = rows.first() else {
            return;
        };
        for (index, meta) in metadata.iter_mut().enumerate() {
            if let Some(data_type) = first.get(index).and_then(DataType::infer) {
                meta.data_type = data_type;
            }

            let mut seen = BTreeSet::new();
            let examples: Vec<String> = rows
                .iter()
                .take(self.sample_rows.max(1))
                .filter_map(|row| row.get(index))
                .filter(|value| is_example_worthy(value))
                .map(GraphValue::render)
                .filter(|rendered| seen.insert(rendered.clone()))
                .take(MAX_EXAMPLES)
                .collect();
            if !examples.is_empty() {
                meta.example_values = Some(examples);
            }
        }
    }
}

fn is_example_worthy(value: &GraphValue) -> bool {
    !matches!(
        value,
        GraphValue::Null | GraphValue::Node(_) | GraphValue::Relationship(_) | GraphValue::Map(_)
    )
}

fn overlay(
    metadata: &mut [ColumnMetadata],
    pattern: &QueryPattern,
    catalog: &SemanticCatalogSnapshot,
) {
    if catalog.is_empty() {
        return;
    }
    for meta in metadata.iter_mut() {
        match pattern.column(&meta.name) {
            Some(ColumnKind::Node { labels, .. }) => {
                if let Some(entity) = catalog.entity_for_labels(labels) {
                    meta.data_type = DataType::Map;
                    if entity.description.is_some() {
                        meta.description = entity.description.clone();
                    }
                }
            }
            Some(ColumnKind::Property {
                property, labels, ..
            }) => {
                let entity = if labels.is_empty() {
                    sole_owner(catalog, &pattern.node_labels, property)
                } else {
                    catalog.entity_for_labels(labels)
                };
                let Some(field) = entity.and_then(|e| e.field(property)) else {
                    continue;
                };
                meta.data_type = field.data_type;
                if field.description.is_some() {
                    meta.description = field.description.clone();
                }
                meta.is_identifier |= field.is_identifier;
                meta.required = field.required;
            }
            _ => {}
        }
    }
}

/// The only entity among the query's labels that defines `property`.
fn sole_owner<'a>(
    catalog: &'a SemanticCatalogSnapshot,
    labels: &BTreeSet<String>,
    property: &str,
) -> Option<&'a SemanticEntity> {
    let mut owners = labels
        .iter()
        .filter_map(|label| catalog.entity(label))
        .filter(|entity| entity.field(property).is_some());
    match (owners.next(), owners.next()) {
        (Some(entity), None) => Some(entity),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use ontograph_core::{GraphNode, SemanticField};

    use super::*;
    use crate::analyzer::analyze;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn patient_catalog() -> SemanticCatalogSnapshot {
        SemanticCatalogSnapshot {
            entities: vec![SemanticEntity {
                node_label: "Patient".into(),
                description: Some("A person receiving care".into()),
                fields: vec![
                    SemanticField {
                        name: "mrn".into(),
                        data_type: DataType::String,
                        description: Some("Medical record number".into()),
                        is_identifier: true,
                        required: true,
                    },
                    SemanticField {
                        name: "age".into(),
                        data_type: DataType::Integer,
                        description: Some("Age in years".into()),
                        is_identifier: false,
                        required: false,
                    },
                ],
            }],
            relations: vec![],
        }
    }

    fn node(id: i64, name: &str) -> GraphValue {
        let mut properties = BTreeMap::new();
        properties.insert("name".to_string(), GraphValue::from(name));
        GraphValue::Node(GraphNode {
            id,
            labels: vec!["Patient".into()],
            properties,
        })
    }

    #[test]
    fn test_no_rows_no_catalog_is_all_string() {
        let columns = cols(&["a", "b"]);
        let pattern = analyze("MATCH (n) RETURN n.x AS a, n.y AS b", &columns);
        let meta = TypeEnricher::new(3).enrich(
            &pattern,
            &columns,
            &[],
            &SemanticCatalogSnapshot::default(),
        );
        assert!(meta.iter().all(|m| m.data_type == DataType::String));
        assert!(meta.iter().all(|m| m.description.is_none()));
        assert!(meta.iter().all(|m| m.example_values.is_none()));
    }

    #[test]
    fn test_sample_pass_types_first_row() {
        let columns = cols(&["total", "ratio", "active", "since", "label"]);
        let pattern = analyze(
            "MATCH (n) RETURN count(n) AS total, 0.5 AS ratio, true AS active, '2024-01-31' AS since, 'x' AS label",
            &columns,
        );
        let rows = vec![vec![
            GraphValue::Integer(12),
            GraphValue::Float(0.5),
            GraphValue::Boolean(true),
            GraphValue::from("2024-01-31"),
            GraphValue::from("x"),
        ]];
        let meta = TypeEnricher::new(3).enrich(
            &pattern,
            &columns,
            &rows,
            &SemanticCatalogSnapshot::default(),
        );
        let types: Vec<DataType> = meta.iter().map(|m| m.data_type).collect();
        assert_eq!(
            types,
            vec![
                DataType::Integer,
                DataType::Float,
                DataType::Boolean,
                DataType::Date,
                DataType::String
            ]
        );
    }

    #[test]
    fn test_catalog_beats_sample() {
        let columns = cols(&["mrn", "age"]);
        let pattern = analyze(
            "MATCH (p:Patient) RETURN p.mrn AS mrn, p.age AS age",
            &columns,
        );
        // Numeric-looking record numbers sample as Integer.
        let rows = vec![vec![GraphValue::from("000123"), GraphValue::from("41")]];
        let meta =
            TypeEnricher::new(3).enrich(&pattern, &columns, &rows, &patient_catalog());

        assert_eq!(meta[0].data_type, DataType::String);
        assert_eq!(meta[0].description.as_deref(), Some("Medical record number"));
        assert!(meta[0].is_identifier);
        assert!(meta[0].required);
        assert_eq!(meta[1].data_type, DataType::Integer);
        assert_eq!(meta[1].description.as_deref(), Some("Age in years"));
    }

    #[test]
    fn test_node_column_takes_entity_description() {
        let columns = cols(&["n"]);
        let pattern = analyze("MATCH (n:Patient) RETURN n", &columns);
        let rows = vec![vec![node(1, "Ada")], vec![node(2, "Grace")]];
        let meta =
            TypeEnricher::new(3).enrich(&pattern, &columns, &rows, &patient_catalog());

        assert_eq!(meta[0].data_type, DataType::Map);
        assert_eq!(meta[0].description.as_deref(), Some("A person receiving care"));
        assert!(meta[0].example_values.is_none());
    }

    #[test]
    fn test_unmatched_label_keeps_sample() {
        let columns = cols(&["code"]);
        let pattern = analyze("MATCH (w:Ward) RETURN w.code AS code", &columns);
        let rows = vec![vec![GraphValue::from("17")]];
        let meta =
            TypeEnricher::new(3).enrich(&pattern, &columns, &rows, &patient_catalog());
        assert_eq!(meta[0].data_type, DataType::Integer);
        assert!(meta[0].description.is_none());
    }

    #[test]
    fn test_example_values_distinct_and_capped() {
        let columns = cols(&["city"]);
        let pattern = analyze("MATCH (p:Patient) RETURN p.city AS city", &columns);
        let rows: Vec<Vec<GraphValue>> = ["Oslo", "Oslo", "Bergen", "Null", "Tromsø"]
            .iter()
            .map(|c| {
                if *c == "Null" {
                    vec![GraphValue::Null]
                } else {
                    vec![GraphValue::from(*c)]
                }
            })
            .collect();
        let meta = TypeEnricher::new(5).enrich(
            &pattern,
            &columns,
            &rows,
            &SemanticCatalogSnapshot::default(),
        );
        assert_eq!(
            meta[0].example_values,
            Some(vec!["Oslo".into(), "Bergen".into(), "Tromsø".into()])
        );
    }

    #[test]
    fn test_identifier_heuristics() {
        assert!(looks_like_identifier("id"));
        assert!(looks_like_identifier("ID"));
        assert!(looks_like_identifier("patient_id"));
        assert!(looks_like_identifier("patientId"));
        assert!(!looks_like_identifier("paid"));
        assert!(!looks_like_identifier("valid"));
        assert!(!looks_like_identifier("name"));
    }

    #[test]
    fn test_property_of_unlabeled_variable_uses_sole_owner() {
        let columns = cols(&["mrn"]);
        let pattern = analyze(
            "MATCH (:Ward)<-[:ADMITTED_TO]-(p)-[:IS]->(:Patient) RETURN p.mrn AS mrn",
            &columns,
        );
        let meta = TypeEnricher::new(3).enrich(&pattern, &columns, &[], &patient_catalog());
        assert_eq!(meta[0].description.as_deref(), Some("Medical record number"));
    }
}
