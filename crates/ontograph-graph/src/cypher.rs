//! Cypher statements built by this crate.
//!
//! Values always travel as parameters. Labels and relationship types cannot
//! be parameterized in Cypher, so they are backtick-escaped before
//! interpolation.

use std::collections::BTreeMap;

use ontograph_core::GraphValue;

/// A Cypher statement plus its parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub text: String,
    pub params: BTreeMap<String, GraphValue>,
    /// Expected result column names, in order. Rows arrive keyed by name,
    /// so this fixes the column order of the result.
    pub projection: Vec<String>,
}

impl Statement {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            params: BTreeMap::new(),
            projection: Vec::new(),
        }
    }

    pub fn param(mut self, key: &str, value: impl Into<GraphValue>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    pub fn projection(mut self, columns: Vec<String>) -> Self {
        self.projection = columns;
        self
    }
}

/// Shorthand mirroring `neo4rs::query`.
pub fn statement(text: impl Into<String>) -> Statement {
    Statement::new(text)
}

/// Quote a label, relationship type, or property key for interpolation.
pub fn escape_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_identifier() {
        assert_eq!(escape_identifier("Patient"), "`Patient`");
        assert_eq!(escape_identifier("Has Visit"), "`Has Visit`");
        assert_eq!(
            escape_identifier("x`) DETACH DELETE n //"),
            "`x``) DETACH DELETE n //`"
        );
    }

    #[test]
    fn test_statement_params() {
        let s = statement("MATCH (n {id: $id}) RETURN n")
            .param("id", "abc")
            .param("limit", 5i64);
        assert_eq!(s.params.get("id"), Some(&GraphValue::from("abc")));
        assert_eq!(s.params.get("limit"), Some(&GraphValue::Integer(5)));
    }
}
