//! Graph values and semantic data types.
//!
//! The driver hands back loosely typed property values; they are converted
//! once, at the boundary, into [`GraphValue`] so callers never coerce ad hoc.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// A value returned by (or sent to) the graph database.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum GraphValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    /// ISO-8601 date or datetime text.
    Date(String),
    List(Vec<GraphValue>),
    Map(BTreeMap<String, GraphValue>),
    Node(GraphNode),
    Relationship(GraphRelationship),
}

/// A whole node as returned in a result row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphNode {
    pub id: i64,
    pub labels: Vec<String>,
    pub properties: BTreeMap<String, GraphValue>,
}

/// A whole relationship as returned in a result row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphRelationship {
    pub id: i64,
    #[serde(rename = "type")]
    pub rel_type: String,
    pub start: i64,
    pub end: i64,
    pub properties: BTreeMap<String, GraphValue>,
}

impl GraphValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) | Self::Date(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            Self::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            Self::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// List of strings, skipping non-string members.
    pub fn as_string_list(&self) -> Vec<String> {
        match self {
            Self::List(items) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            Self::String(s) => vec![s.clone()],
            _ => Vec::new(),
        }
    }

    /// Property map of a node, relationship, or map value.
    pub fn properties(&self) -> Option<&BTreeMap<String, GraphValue>> {
        match self {
            Self::Node(n) => Some(&n.properties),
            Self::Relationship(r) => Some(&r.properties),
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Look up a property on a node, relationship, or map value.
    pub fn get(&self, key: &str) -> Option<&GraphValue> {
        self.properties().and_then(|p| p.get(key))
    }

    /// Render as JSON for transport.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// Short human-readable rendering, used for example values.
    pub fn render(&self) -> String {
        match self {
            Self::Null => "null".to_string(),
            Self::Boolean(b) => b.to_string(),
            Self::Integer(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::String(s) | Self::Date(s) => s.clone(),
            other => other.to_json().to_string(),
        }
    }
}

impl From<&str> for GraphValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for GraphValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for GraphValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for GraphValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for GraphValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<serde_json::Value> for GraphValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Boolean(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Integer(i),
                None => Self::Float(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => Self::String(s),
            Value::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            Value::Object(map) => {
                Self::Map(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

// ── Data Types ────────────────────────────────────────────────────

/// Semantic data type attached to result columns and schema properties.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub enum DataType {
    #[default]
    String,
    Integer,
    Float,
    Boolean,
    Date,
    List,
    Map,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "String",
            Self::Integer => "Integer",
            Self::Float => "Float",
            Self::Boolean => "Boolean",
            Self::Date => "Date",
            Self::List => "List",
            Self::Map => "Map",
        }
    }

    /// Type of a concrete value. `None` for nulls, which carry no signal.
    ///
    /// Text is parsed: integers, floats, booleans, and ISO dates are
    /// recognized; anything else stays `String`.
    pub fn infer(value: &GraphValue) -> Option<Self> {
        match value {
            GraphValue::Null => None,
            GraphValue::Boolean(_) => Some(Self::Boolean),
            GraphValue::Integer(_) => Some(Self::Integer),
            GraphValue::Float(_) => Some(Self::Float),
            GraphValue::Date(_) => Some(Self::Date),
            GraphValue::List(_) => Some(Self::List),
            GraphValue::Map(_) | GraphValue::Node(_) | GraphValue::Relationship(_) => {
                Some(Self::Map)
            }
            GraphValue::String(s) => Some(Self::infer_text(s)),
        }
    }

    /// Type suggested by a textual value.
    pub fn infer_text(text: &str) -> Self {
        let t = text.trim();
        if t.is_empty() {
            return Self::String;
        }
        if t.parse::<i64>().is_ok() {
            return Self::Integer;
        }
        if t.parse::<f64>().is_ok() && t.chars().any(|c| c.is_ascii_digit()) {
            return Self::Float;
        }
        if t.eq_ignore_ascii_case("true") || t.eq_ignore_ascii_case("false") {
            return Self::Boolean;
        }
        if is_iso_date(t) {
            return Self::Date;
        }
        Self::String
    }

    /// Map a Neo4j schema procedure type name (`Long`, `StringArray`, ...).
    pub fn from_neo4j_type(name: &str) -> Self {
        if name.ends_with("Array") {
            return Self::List;
        }
        match name {
            "Long" | "Integer" => Self::Integer,
            "Double" | "Float" => Self::Float,
            "Boolean" => Self::Boolean,
            "Date" | "DateTime" | "LocalDateTime" | "Time" | "LocalTime" | "Duration" => {
                Self::Date
            }
            "Map" => Self::Map,
            "List" => Self::List,
            _ => Self::String,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "string" | "text" | "str" | "varchar" | "uuid" | "enum" => Ok(Self::String),
            "integer" | "int" | "long" | "bigint" | "smallint" => Ok(Self::Integer),
            "float" | "double" | "decimal" | "number" | "numeric" | "real" => Ok(Self::Float),
            "boolean" | "bool" => Ok(Self::Boolean),
            "date" | "datetime" | "timestamp" | "localdatetime" | "time" => Ok(Self::Date),
            "list" | "array" => Ok(Self::List),
            "map" | "object" | "json" => Ok(Self::Map),
            other => Err(format!("unknown data type: {other}")),
        }
    }
}

impl TryFrom<String> for DataType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DataType> for String {
    fn from(value: DataType) -> Self {
        value.as_str().to_string()
    }
}

/// True for ISO dates, RFC 3339 timestamps, and naive ISO datetimes.
pub fn is_iso_date(text: &str) -> bool {
    NaiveDate::parse_from_str(text, "%Y-%m-%d").is_ok()
        || DateTime::parse_from_rfc3339(text).is_ok()
        || NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
        || NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f").is_ok()
}
