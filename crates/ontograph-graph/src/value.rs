//! Conversion between `neo4rs` Bolt values and [`GraphValue`].

use std::collections::{BTreeMap, HashMap};

use neo4rs::{BoltList, BoltMap, BoltNull, BoltType, Query, Row};
use serde::de::DeserializeOwned;

use ontograph_core::{GraphNode, GraphRelationship, GraphValue};

use crate::client::GraphError;
use crate::cypher::Statement;

/// Build a `neo4rs` query from a statement and its parameters.
pub(crate) fn to_query(statement: &Statement) -> Query {
    statement
        .params
        .iter()
        .fold(neo4rs::query(&statement.text), |q, (key, value)| {
            q.param(key, to_bolt(value))
        })
}

/// Read one row into a name-keyed map of Bolt values.
pub(crate) fn row_fields(row: &Row) -> Result<HashMap<String, BoltType>, GraphError> {
    row.to::<HashMap<String, BoltType>>()
        .map_err(|e| GraphError::Serialization(format!("row: {e}")))
}

/// Column order for a result. Names from `projection` come first in their
/// projected order; anything else the database returned follows by name.
pub fn order_columns<'a>(
    names: impl IntoIterator<Item = &'a String>,
    projection: &[String],
) -> Vec<String> {
    let mut rest: Vec<String> = names.into_iter().cloned().collect();
    rest.sort();
    let mut ordered = Vec::with_capacity(rest.len());
    for name in projection {
        if let Some(idx) = rest.iter().position(|n| n == name) {
            ordered.push(rest.remove(idx));
        }
    }
    ordered.extend(rest);
    ordered
}

/// Take every column out of `fields`, in the given order. Missing columns
/// read as null.
pub(crate) fn row_values(
    mut fields: HashMap<String, BoltType>,
    columns: &[String],
) -> Vec<GraphValue> {
    columns
        .iter()
        .map(|c| fields.remove(c).map(from_bolt).unwrap_or(GraphValue::Null))
        .collect()
}

/// Convert a Bolt value into the boundary tagged union.
pub fn from_bolt(value: BoltType) -> GraphValue {
    match value {
        BoltType::Null(_) => GraphValue::Null,
        BoltType::Boolean(b) => GraphValue::Boolean(b.value),
        BoltType::Integer(i) => GraphValue::Integer(i.value),
        BoltType::Float(f) => GraphValue::Float(f.value),
        BoltType::String(s) => GraphValue::String(s.value),
        BoltType::List(list) => GraphValue::List(list.value.into_iter().map(from_bolt).collect()),
        BoltType::Map(map) => GraphValue::Map(from_bolt_map(map)),
        BoltType::Node(node) => GraphValue::Node(GraphNode {
            id: node.id.value,
            labels: node
                .labels
                .value
                .into_iter()
                .filter_map(|l| match l {
                    BoltType::String(s) => Some(s.value),
                    _ => None,
                })
                .collect(),
            properties: from_bolt_map(node.properties),
        }),
        BoltType::Relation(rel) => GraphValue::Relationship(GraphRelationship {
            id: rel.id.value,
            rel_type: rel.typ.value,
            start: rel.start_node_id.value,
            end: rel.end_node_id.value,
            properties: from_bolt_map(rel.properties),
        }),
        other => temporal(&other).unwrap_or_else(|| GraphValue::String(format!("{other:?}"))),
    }
}

/// Dates and datetimes become ISO-8601 [`GraphValue::Date`]; times and
/// durations become ISO-8601 text.
fn temporal(value: &BoltType) -> Option<GraphValue> {
    match value {
        BoltType::Date(_) => read_as::<chrono::NaiveDate>(value)
            .map(|d| GraphValue::Date(d.format("%Y-%m-%d").to_string())),
        BoltType::LocalDateTime(_) => read_as::<chrono::NaiveDateTime>(value)
            .map(|d| GraphValue::Date(d.format("%Y-%m-%dT%H:%M:%S%.f").to_string())),
        BoltType::DateTime(_) | BoltType::DateTimeZoneId(_) => {
            read_as::<chrono::DateTime<chrono::FixedOffset>>(value)
                .map(|d| GraphValue::Date(d.to_rfc3339()))
        }
        BoltType::LocalTime(_) | BoltType::Time(_) => read_as::<chrono::NaiveTime>(value)
            .map(|t| GraphValue::String(t.format("%H:%M:%S%.f").to_string())),
        BoltType::Duration(_) => read_as::<std::time::Duration>(value)
            .map(|d| GraphValue::String(iso_duration(d))),
        _ => None,
    }
}

/// Temporal values deserialize through chrono only from a row, so read the
/// value back out of a one-column row.
fn read_as<T: DeserializeOwned>(value: &BoltType) -> Option<T> {
    let row = Row::new(
        BoltList::from(vec![BoltType::from("v")]),
        BoltList::from(vec![value.clone()]),
    );
    row.get::<T>("v").ok()
}

fn iso_duration(d: std::time::Duration) -> String {
    match d.subsec_nanos() {
        0 => format!("PT{}S", d.as_secs()),
        nanos => format!("PT{}.{:09}S", d.as_secs(), nanos)
            .trim_end_matches('0')
            .to_string(),
    }
}

fn from_bolt_map(map: BoltMap) -> BTreeMap<String, GraphValue> {
    map.value
        .into_iter()
        .map(|(k, v)| (k.value, from_bolt(v)))
        .collect()
}

/// Convert a parameter value for the driver. Nodes and relationships are
/// sent as their property maps.
pub fn to_bolt(value: &GraphValue) -> BoltType {
    match value {
        GraphValue::Null => BoltType::Null(BoltNull),
        GraphValue::Boolean(b) => BoltType::from(*b),
        GraphValue::Integer(i) => BoltType::from(*i),
        GraphValue::Float(f) => BoltType::from(*f),
        GraphValue::String(s) | GraphValue::Date(s) => BoltType::from(s.clone()),
        GraphValue::List(items) => {
            let list: Vec<BoltType> = items.iter().map(to_bolt).collect();
            BoltType::from(list)
        }
        GraphValue::Map(map) => map_to_bolt(map),
        GraphValue::Node(node) => map_to_bolt(&node.properties),
        GraphValue::Relationship(rel) => map_to_bolt(&rel.properties),
    }
}

fn map_to_bolt(map: &BTreeMap<String, GraphValue>) -> BoltType {
    let converted: HashMap<String, BoltType> =
        map.iter().map(|(k, v)| (k.clone(), to_bolt(v))).collect();
    BoltType::from(converted)
}
