//! In-process stand-in for Neo4j.
//!
//! `ScriptedDriver` answers statements from a list of rules: the first rule
//! whose needle occurs in the statement text wins; unmatched statements
//! return an empty row set. Every call is recorded.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::client::{GraphDriver, GraphError, RowSet};
use crate::cypher::Statement;

struct Rule {
    needle: String,
    response: Result<RowSet, GraphError>,
}

#[derive(Default)]
pub struct ScriptedDriver {
    rules: Vec<Rule>,
    calls: Mutex<Vec<Statement>>,
    last_max_rows: AtomicUsize,
    delay: Option<Duration>,
    label: String,
}

impl ScriptedDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tag the driver, e.g. with the credentials it was built from.
    pub fn labelled(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    /// Answer statements containing `needle` with `rows`.
    pub fn on(mut self, needle: &str, rows: RowSet) -> Self {
        self.rules.push(Rule {
            needle: needle.to_string(),
            response: Ok(rows),
        });
        self
    }

    /// Fail statements containing `needle` with `error`.
    pub fn fail_on(mut self, needle: &str, error: GraphError) -> Self {
        self.rules.push(Rule {
            needle: needle.to_string(),
            response: Err(error),
        });
        self
    }

    /// Sleep before answering every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Statements received so far, in order.
    pub fn calls(&self) -> Vec<Statement> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or_default()
    }

    /// Max rows requested by the most recent fetch.
    pub fn last_max_rows(&self) -> usize {
        self.last_max_rows.load(Ordering::SeqCst)
    }

    async fn answer(&self, statement: &Statement) -> Result<RowSet, GraphError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(statement.clone());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.rules
            .iter()
            .find(|r| statement.text.contains(&r.needle))
            .map(|r| r.response.clone())
            .unwrap_or_else(|| Ok(RowSet::default()))
    }
}

#[async_trait]
impl GraphDriver for ScriptedDriver {
    async fn fetch(&self, statement: &Statement, max_rows: usize) -> Result<RowSet, GraphError> {
        self.last_max_rows.store(max_rows, Ordering::SeqCst);
        let mut rows = self.answer(statement).await?;
        rows.rows.truncate(max_rows);
        Ok(rows)
    }

    async fn run(&self, statement: &Statement) -> Result<(), GraphError> {
        self.answer(statement).await.map(|_| ())
    }
}
