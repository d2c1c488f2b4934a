//! Heuristic classification of Cypher text.
//!
//! The analyzer never rejects input. It scans blanked query text for node
//! patterns, relationship patterns, path bindings, and the final `RETURN`
//! projection, then decides what each returned column holds and what one
//! row represents. Anything it cannot trace degrades to `Unknown`.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use regex::Regex;

use ontograph_core::{ColumnKind, ColumnPattern, QueryPattern, RowGrain};

use crate::lexer::{self, Word};

const IDENT: &str = r"(?:`[^`]+`|[A-Za-z_][A-Za-z0-9_]*)";

static IDENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(IDENT).expect("identifier pattern"));

static BARE_IDENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"^{IDENT}$")).expect("bare identifier pattern"));

static NODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"\(\s*(?P<var>{IDENT})?(?P<labels>(?:\s*[:&|]\s*!?\s*{IDENT})*)\s*(?:\{{[^{{}}]*\}})?\s*\)"
    ))
    .expect("node pattern")
});

static REL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"-\s*\[\s*(?P<var>{IDENT})?\s*(?P<types>:\s*!?\s*{IDENT}(?:\s*\|\s*:?\s*!?\s*{IDENT})*)?\s*(?P<hops>\*\s*[0-9]*\s*(?:\.\.\s*[0-9]*)?)?\s*(?:\{{[^{{}}]*\}})?\s*\]"
    ))
    .expect("relationship pattern")
});

static PATH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?P<var>{IDENT})\s*=\s*(?:(?i:shortestPath|allShortestPaths)\s*\(\s*)?\("
    ))
    .expect("path binding pattern")
});

static PROPERTY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^(?P<var>{IDENT})\s*\.\s*(?P<prop>{IDENT})$")).expect("property pattern")
});

static ALIAS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?s)^(?P<expr>.+?)\s+(?i:AS)\s+(?P<alias>{IDENT})$")).expect("alias pattern")
});

static AGGREGATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(count|sum|avg|min|max|collect|stdev|stdevp|percentilecont|percentiledisc)\s*\(",
    )
    .expect("aggregate pattern")
});

static WRITE_PROCEDURE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\bCALL\s+(?:apoc\.(?:create|merge|refactor|periodic|atomic|nodes\.delete|schema\.assert|trigger)|db\.create|dbms\.security)\.?",
    )
    .expect("write procedure pattern")
});

/// Clause keywords that end a projection or start a new clause.
const CLAUSES: &[&str] = &[
    "MATCH", "OPTIONAL", "WHERE", "WITH", "UNWIND", "CALL", "RETURN", "ORDER", "SKIP", "LIMIT",
    "CREATE", "MERGE", "SET", "DELETE", "DETACH", "REMOVE", "FOREACH", "UNION", "LOAD", "USE",
];

const PATTERN_CLAUSES: &[&str] = &["MATCH", "MERGE", "CREATE"];

const WRITE_CLAUSES: &[&str] = &[
    "CREATE", "MERGE", "SET", "DELETE", "DETACH", "REMOVE", "DROP", "FOREACH",
];

/// Keywords followed by an expression rather than a clause.
const EXPRESSION_KEYWORDS: &[&str] = &[
    "RETURN", "WITH", "AS", "DISTINCT", "WHERE", "AND", "OR", "XOR", "NOT", "IN", "UNWIND",
    "YIELD", "BY", "SKIP", "LIMIT", "CASE", "WHEN", "THEN", "ELSE", "IS", "CONTAINS", "STARTS",
    "ENDS", "MATCH",
];

/// Classify `query` given the columns the database returned.
pub fn analyze(query: &str, columns: &[String]) -> QueryPattern {
    match lexer::blank(query) {
        Ok(text) => Analysis::new(&text).pattern(columns),
        Err(_) => QueryPattern::unknown(columns),
    }
}

/// Column names the final projection would produce, in order.
///
/// Used when the database returns no rows and therefore no column names.
pub fn return_columns(query: &str) -> Vec<String> {
    let Ok(text) = lexer::blank(query) else {
        return Vec::new();
    };
    let analysis = Analysis::new(&text);
    match analysis.projection() {
        Some(projection) if !projection.star => {
            projection.items.into_iter().map(|item| item.name).collect()
        }
        _ => Vec::new(),
    }
}

/// Whether the query contains a write clause or calls a writing procedure.
///
/// Text that cannot be lexed is treated as a write.
pub fn is_write(query: &str) -> bool {
    match lexer::blank(query) {
        Ok(text) => Analysis::new(&text).is_write(),
        Err(_) => true,
    }
}

#[derive(Default)]
struct Bindings {
    nodes: BTreeMap<String, BTreeSet<String>>,
    relationships: BTreeMap<String, BTreeSet<String>>,
    paths: BTreeSet<String>,
    aggregates: BTreeMap<String, String>,
    node_labels: BTreeSet<String>,
    relationship_types: BTreeSet<String>,
    has_relationship_pattern: bool,
}

struct ReturnItem {
    expr: String,
    name: String,
}

struct Projection {
    items: Vec<ReturnItem>,
    distinct: bool,
    star: bool,
}

struct Analysis<'a> {
    text: &'a str,
    words: Vec<Word>,
    bindings: Bindings,
}

impl<'a> Analysis<'a> {
    fn new(text: &'a str) -> Self {
        let mut analysis = Self {
            text,
            words: lexer::words(text),
            bindings: Bindings::default(),
        };
        analysis.scan_relationships();
        analysis.scan_nodes();
        analysis.scan_paths();
        analysis.scan_with_aliases();
        analysis
    }

    fn is_write(&self) -> bool {
        let clause = self.words.iter().enumerate().any(|(i, w)| {
            let keyword = WRITE_CLAUSES.iter().any(|k| w.is(k))
                || (w.is("LOAD") && self.words.get(i + 1).is_some_and(|n| n.is("CSV")));
            keyword && self.starts_clause(w)
        });
        clause || WRITE_PROCEDURE_RE.is_match(self.text)
    }

    /// A keyword starts a clause at the start of the text, after a closed
    /// bracket or a value, or inside `{ }` and `FOREACH ( | )` bodies. In
    /// expression position (`(set:Label)`, `RETURN remove`, `AS set`) it is
    /// a name.
    fn starts_clause(&self, word: &Word) -> bool {
        if matches!(next_char(self.text, word.end), Some(':' | '.')) {
            return false;
        }
        match prev_char(self.text, word.start) {
            None => true,
            Some(')' | ']' | '}' | '{' | '|' | '\'' | '"' | '`') => true,
            Some(c) if c.is_alphanumeric() || c == '_' => prev_word(self.text, word.start)
                .is_some_and(|w| !EXPRESSION_KEYWORDS.contains(&w.as_str())),
            Some(_) => false,
        }
    }

    fn pattern(&self, columns: &[String]) -> QueryPattern {
        let mut pattern = match self.projection() {
            Some(projection) if !projection.star || !columns.is_empty() => {
                self.classify(&projection, columns)
            }
            _ => QueryPattern::unknown(columns),
        };
        pattern.node_labels = self.bindings.node_labels.clone();
        pattern.relationship_types = self.bindings.relationship_types.clone();
        pattern.is_write = self.is_write();
        pattern
    }

    // ── Scanning ──────────────────────────────────────────────────

    fn scan_relationships(&mut self) {
        for caps in REL_RE.captures_iter(self.text) {
            self.bindings.has_relationship_pattern = true;
            let types: BTreeSet<String> = caps
                .name("types")
                .map(|t| IDENT_RE.find_iter(t.as_str()).map(|m| lexer::unquote(m.as_str())).collect())
                .unwrap_or_default();
            self.bindings.relationship_types.extend(types.iter().cloned());
            if let Some(var) = caps.name("var") {
                self.bindings
                    .relationships
                    .entry(lexer::unquote(var.as_str()))
                    .or_default()
                    .extend(types);
            }
        }
        // `--`, `-->`, `<--` carry no brackets.
        if self.text.contains("--") || self.text.contains("<-") || self.text.contains("->") {
            self.bindings.has_relationship_pattern = true;
        }
    }

    fn scan_nodes(&mut self) {
        for caps in NODE_RE.captures_iter(self.text) {
            let Some(whole) = caps.get(0) else { continue };
            let labels: BTreeSet<String> = caps
                .name("labels")
                .map(|l| IDENT_RE.find_iter(l.as_str()).map(|m| lexer::unquote(m.as_str())).collect())
                .unwrap_or_default();

            if labels.is_empty() && !self.is_node_position(whole.start(), whole.end()) {
                continue;
            }
            self.bindings.node_labels.extend(labels.iter().cloned());
            if let Some(var) = caps.name("var") {
                self.bindings
                    .nodes
                    .entry(lexer::unquote(var.as_str()))
                    .or_default()
                    .extend(labels);
            }
        }
    }

    fn scan_paths(&mut self) {
        for caps in PATH_RE.captures_iter(self.text) {
            let Some(var) = caps.name("var") else { continue };
            let before = prev_char(self.text, var.start());
            if before == Some('.') {
                continue;
            }
            let in_pattern = before == Some(',')
                || prev_word(self.text, var.start())
                    .is_some_and(|w| PATTERN_CLAUSES.contains(&w.as_str()));
            if in_pattern {
                self.bindings.paths.insert(lexer::unquote(var.as_str()));
            }
        }
    }

    /// `WITH n AS patient` carries `n`'s bindings over to `patient`.
    fn scan_with_aliases(&mut self) {
        let withs: Vec<(usize, usize)> = self
            .words
            .iter()
            .enumerate()
            .filter(|(_, w)| w.is_clause("WITH"))
            .map(|(i, w)| (w.end, self.clause_end(i)))
            .collect();

        for (start, end) in withs {
            let body = strip_distinct(self.text[start..end].trim()).0;
            for item in lexer::split_top_level(body, ',') {
                let Some(caps) = ALIAS_RE.captures(item.trim()) else { continue };
                let (Some(expr), Some(alias)) = (caps.name("expr"), caps.name("alias")) else {
                    continue;
                };
                let expr = expr.as_str().trim();
                let alias = lexer::unquote(alias.as_str());
                if let Some(function) = aggregate_function(expr) {
                    self.bindings.aggregates.insert(alias, function);
                    continue;
                }
                if !BARE_IDENT_RE.is_match(expr) {
                    continue;
                }
                let source = lexer::unquote(expr);
                if let Some(labels) = self.bindings.nodes.get(&source).cloned() {
                    self.bindings.nodes.insert(alias, labels);
                } else if let Some(types) = self.bindings.relationships.get(&source).cloned() {
                    self.bindings.relationships.insert(alias, types);
                } else if self.bindings.paths.contains(&source) {
                    self.bindings.paths.insert(alias);
                } else if let Some(function) = self.bindings.aggregates.get(&source).cloned() {
                    self.bindings.aggregates.insert(alias, function);
                }
            }
        }
    }

    /// An unlabeled `(var)` is a node only next to a relationship or as the
    /// direct operand of a pattern clause.
    fn is_node_position(&self, start: usize, end: usize) -> bool {
        let before = prev_char(self.text, start);
        let after = next_char(self.text, end);
        if matches!(before, Some('-' | '>')) || matches!(after, Some('-' | '<')) {
            return true;
        }
        if prev_word(self.text, start).is_some_and(|w| PATTERN_CLAUSES.contains(&w.as_str())) {
            return true;
        }
        matches!(before, Some(',' | '='))
            && self
                .current_clause(start)
                .is_some_and(|w| PATTERN_CLAUSES.iter().any(|k| w.is(k)))
    }

    fn current_clause(&self, offset: usize) -> Option<&Word> {
        self.words
            .iter()
            .rev()
            .filter(|w| w.end <= offset && w.depth == 0)
            .find(|w| CLAUSES.iter().any(|k| w.is(k)))
    }

    /// Offset where the clause introduced by word `index` ends.
    fn clause_end(&self, index: usize) -> usize {
        self.words
            .iter()
            .skip(index + 1)
            .find(|w| w.depth == 0 && CLAUSES.iter().any(|k| w.is(k)))
            .map(|w| w.start)
            .unwrap_or(self.text.len())
    }

    // ── Projection ───────────────────────────────────────────────

    fn projection(&self) -> Option<Projection> {
        let index = self.words.iter().rposition(|w| w.is_clause("RETURN"))?;
        let start = self.words[index].end;
        let end = self
            .words
            .iter()
            .skip(index + 1)
            .find(|w| w.depth == 0 && ["ORDER", "SKIP", "LIMIT", "UNION"].iter().any(|k| w.is(k)))
            .map(|w| w.start)
            .unwrap_or(self.text.len());

        let body = self.text[start..end].trim().trim_end_matches(';').trim();
        let (body, distinct) = strip_distinct(body);
        if body == "*" {
            return Some(Projection {
                items: Vec::new(),
                distinct,
                star: true,
            });
        }

        let items: Vec<ReturnItem> = lexer::split_top_level(body, ',')
            .into_iter()
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(|item| match ALIAS_RE.captures(item) {
                Some(caps) => ReturnItem {
                    expr: caps.name("expr").map_or(item, |m| m.as_str()).trim().to_string(),
                    name: caps
                        .name("alias")
                        .map_or_else(|| item.to_string(), |m| lexer::unquote(m.as_str())),
                },
                None => ReturnItem {
                    expr: item.to_string(),
                    name: lexer::unquote(item),
                },
            })
            .collect();

        if items.is_empty() {
            return None;
        }
        Some(Projection {
            items,
            distinct,
            star: false,
        })
    }

    fn classify(&self, projection: &Projection, columns: &[String]) -> QueryPattern {
        let names: Vec<String> = if columns.is_empty() {
            projection.items.iter().map(|i| i.name.clone()).collect()
        } else {
            columns.to_vec()
        };

        let columns: Vec<ColumnPattern> = names
            .iter()
            .enumerate()
            .map(|(position, name)| {
                let kind = if projection.star {
                    self.classify_expr(name)
                } else if projection.items.len() == names.len() {
                    self.classify_expr(&projection.items[position].expr)
                } else {
                    projection
                        .items
                        .iter()
                        .find(|item| &item.name == name)
                        .map_or(ColumnKind::Unknown, |item| self.classify_expr(&item.expr))
                };
                ColumnPattern {
                    name: name.clone(),
                    kind,
                }
            })
            .collect();

        let grain = self.grain(&columns, projection.distinct);
        QueryPattern {
            grain,
            node_labels: BTreeSet::new(),
            relationship_types: BTreeSet::new(),
            columns,
            distinct: projection.distinct,
            is_write: false,
            unknown: grain == RowGrain::Unknown,
        }
    }

    fn classify_expr(&self, expr: &str) -> ColumnKind {
        let expr = expr.trim();
        if let Some(function) = aggregate_function(expr) {
            return ColumnKind::Aggregate { function };
        }

        if BARE_IDENT_RE.is_match(expr) {
            let variable = lexer::unquote(expr);
            let b = &self.bindings;
            if let Some(labels) = b.nodes.get(&variable) {
                return ColumnKind::Node {
                    labels: labels.iter().cloned().collect(),
                    variable,
                };
            }
            if let Some(types) = b.relationships.get(&variable) {
                return ColumnKind::Relationship {
                    types: types.iter().cloned().collect(),
                    variable,
                };
            }
            if b.paths.contains(&variable) {
                return ColumnKind::Path { variable };
            }
            if let Some(function) = b.aggregates.get(&variable) {
                return ColumnKind::Aggregate {
                    function: function.clone(),
                };
            }
            return ColumnKind::Expression;
        }

        if let Some(caps) = PROPERTY_RE.captures(expr) {
            if let (Some(var), Some(prop)) = (caps.name("var"), caps.name("prop")) {
                let variable = lexer::unquote(var.as_str());
                let labels = self
                    .bindings
                    .nodes
                    .get(&variable)
                    .map(|l| l.iter().cloned().collect())
                    .unwrap_or_default();
                return ColumnKind::Property {
                    variable,
                    property: lexer::unquote(prop.as_str()),
                    labels,
                };
            }
        }

        ColumnKind::Expression
    }

    fn grain(&self, columns: &[ColumnPattern], distinct: bool) -> RowGrain {
        let aggregate = distinct
            || columns
                .iter()
                .any(|c| matches!(c.kind, ColumnKind::Aggregate { .. }));
        if aggregate {
            return RowGrain::Aggregate;
        }

        let relationship = columns.iter().any(|c| {
            matches!(
                c.kind,
                ColumnKind::Relationship { .. } | ColumnKind::Path { .. }
            )
        });
        if relationship {
            return RowGrain::PerRelationship;
        }

        let node_vars: BTreeSet<&str> = columns
            .iter()
            .filter_map(|c| match &c.kind {
                ColumnKind::Node { variable, .. } => Some(variable.as_str()),
                ColumnKind::Property { variable, .. }
                    if self.bindings.nodes.contains_key(variable) =>
                {
                    Some(variable.as_str())
                }
                _ => None,
            })
            .collect();

        match node_vars.len() {
            1 => RowGrain::PerNode,
            n if n >= 2 && self.bindings.has_relationship_pattern => RowGrain::PerRelationship,
            _ => RowGrain::Unknown,
        }
    }
}

fn aggregate_function(expr: &str) -> Option<String> {
    AGGREGATE_RE
        .captures_iter(expr)
        .find(|caps| caps.get(0).is_some_and(|m| prev_char(expr, m.start()) != Some('.')))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_ascii_lowercase())
}

fn strip_distinct(body: &str) -> (&str, bool) {
    match (body.get(..8), body.get(8..)) {
        (Some(head), Some(rest))
            if head.eq_ignore_ascii_case("DISTINCT")
                && rest
                    .chars()
                    .next()
                    .map_or(true, |c| !(c.is_alphanumeric() || c == '_')) =>
        {
            (rest.trim_start(), true)
        }
        _ => (body, false),
    }
}

fn prev_char(text: &str, offset: usize) -> Option<char> {
    text[..offset].chars().rev().find(|c| !c.is_whitespace())
}

fn next_char(text: &str, offset: usize) -> Option<char> {
    text[offset..].chars().find(|c| !c.is_whitespace())
}

/// The word ending right before `offset`, uppercased.
fn prev_word(text: &str, offset: usize) -> Option<String> {
    let head = text[..offset].trim_end();
    let start = head
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_alphanumeric() || *c == '_')
        .last()
        .map(|(i, _)| i)?;
    Some(head[start..].to_ascii_uppercase())
}
