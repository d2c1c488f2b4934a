//! Plausibility checks run before any free-text query reaches the database.

use crate::analyzer;
use crate::error::{AccessError, Result};
use crate::lexer;

/// Keywords a statement may open with.
const LEADING_KEYWORDS: &[&str] = &[
    "MATCH", "OPTIONAL", "WITH", "UNWIND", "CALL", "RETURN", "CREATE", "MERGE", "USE", "EXPLAIN",
    "PROFILE", "SHOW", "LOAD", "FOREACH", "DETACH", "DELETE", "SET", "REMOVE", "CYPHER",
];

/// A query that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedQuery {
    /// Statement text to send, without a trailing `;`.
    pub text: String,
    pub is_write: bool,
    /// Whether the statement projects columns (`RETURN`, `CALL`, `SHOW`).
    pub returns_columns: bool,
}

/// Check that `query` is a single, lexically sound statement.
pub fn prepare(query: &str) -> Result<PreparedQuery> {
    if query.trim().is_empty() {
        return Err(AccessError::validation("query is empty"));
    }

    let blanked = lexer::blank(query).map_err(|e| AccessError::validation(e.to_string()))?;
    if let Some(c) = lexer::unbalanced(&blanked) {
        return Err(AccessError::validation(format!("unbalanced '{c}' in query")));
    }

    // Blanked text keeps byte offsets, so cuts apply to the original.
    let mut end = blanked.trim_end().len();
    if blanked[..end].ends_with(';') {
        end -= 1;
    }
    if contains_outside_identifiers(&blanked[..end], ';') {
        return Err(AccessError::validation(
            "multiple statements are not supported",
        ));
    }
    let text = query[..end].trim();
    let body = blanked[..end].trim();
    if text.is_empty() {
        return Err(AccessError::validation("query is empty"));
    }

    let words = lexer::words(body);
    let leads_with_keyword = body.starts_with(|c: char| c.is_alphabetic())
        && words
            .first()
            .is_some_and(|w| w.start == 0 && LEADING_KEYWORDS.contains(&w.upper.as_str()));
    if !leads_with_keyword {
        return Err(AccessError::validation(
            "query must start with a clause keyword such as MATCH or RETURN",
        ));
    }

    let returns_columns = words
        .iter()
        .any(|w| w.is_clause("RETURN") || w.is_clause("CALL") || w.is_clause("SHOW"));

    Ok(PreparedQuery {
        text: text.to_string(),
        is_write: analyzer::is_write(text),
        returns_columns,
    })
}

fn contains_outside_identifiers(text: &str, needle: char) -> bool {
    let mut in_ident = false;
    text.chars().any(|c| {
        if c == '`' {
            in_ident = !in_ident;
        }
        !in_ident && c == needle
    })
}
