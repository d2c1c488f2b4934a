//! Free-text query execution.
//!
//! Validation and the write policy run before any network call. Execution
//! fetches one row past the limit so truncation is detected without a
//! separate count query.

use std::time::Instant;

use tracing::debug;

use ontograph_core::config::ExecutorSettings;
use ontograph_core::{QueryResult, SemanticCatalogSnapshot};
use ontograph_graph::{statement, GraphClient, RowSet};

use crate::analyzer;
use crate::enricher::TypeEnricher;
use crate::error::{AccessError, Result};
use crate::validate::{self, PreparedQuery};

/// A validated query and its effective row limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPlan {
    pub query: PreparedQuery,
    pub limit: usize,
}

pub struct QueryExecutor {
    settings: ExecutorSettings,
    enricher: TypeEnricher,
}

impl QueryExecutor {
    pub fn new(settings: ExecutorSettings) -> Self {
        Self {
            enricher: TypeEnricher::new(settings.sample_rows),
            settings,
        }
    }

    /// Row limit after defaults and clamping.
    pub fn effective_limit(&self, requested: Option<usize>) -> Result<usize> {
        let max = self.settings.max_limit.max(1);
        match requested {
            None => Ok(self.settings.default_limit.clamp(1, max)),
            Some(0) => Err(AccessError::validation("limit must be at least 1")),
            Some(n) => Ok(n.min(max)),
        }
    }

    /// Validate `query` and apply the write policy. Never touches the network.
    pub fn plan(&self, query: &str, limit: Option<usize>) -> Result<ExecutionPlan> {
        let limit = self.effective_limit(limit)?;
        let query = validate::prepare(query)?;
        if query.is_write && !self.settings.allow_writes {
            return Err(AccessError::validation(
                "write clauses are not allowed in raw queries; use the typed upsert operations",
            ));
        }
        if !query.returns_columns && !query.is_write {
            return Err(AccessError::validation(
                "query returns no columns; add a RETURN clause",
            ));
        }
        Ok(ExecutionPlan { query, limit })
    }

    /// Run a planned query and shape the result.
    pub async fn execute(
        &self,
        client: &GraphClient,
        plan: &ExecutionPlan,
        catalog: &SemanticCatalogSnapshot,
    ) -> Result<QueryResult> {
        let started = Instant::now();
        let projection = analyzer::return_columns(&plan.query.text);
        let query = statement(plan.query.text.as_str()).projection(projection.clone());
        let RowSet { columns, mut rows } =
            client.fetch(query, plan.limit.saturating_add(1)).await?;

        let truncated = rows.len() > plan.limit;
        rows.truncate(plan.limit);

        let columns = if columns.is_empty() { projection } else { columns };
        let pattern = analyzer::analyze(&plan.query.text, &columns);
        let metadata = self.enricher.enrich(&pattern, &columns, &rows, catalog);

        debug!(
            rows = rows.len(),
            truncated,
            grain = ?pattern.grain,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Raw query executed"
        );

        Ok(QueryResult {
            columns,
            row_count: rows.len(),
            rows,
            truncated,
            metadata,
            pattern,
        })
    }

    pub async fn execute_raw(
        &self,
        client: &GraphClient,
        query: &str,
        limit: Option<usize>,
        catalog: &SemanticCatalogSnapshot,
    ) -> Result<QueryResult> {
        let plan = self.plan(query, limit)?;
        self.execute(client, &plan, catalog).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use ontograph_core::{DataType, GraphValue, RowGrain};
    use ontograph_graph::testing::ScriptedDriver;
    use ontograph_graph::GraphError;

    use super::*;

    fn rows(n: i64) -> RowSet {
        RowSet::new(
            vec!["id".into()],
            (0..n).map(|i| vec![GraphValue::Integer(i)]).collect(),
        )
    }

    fn executor() -> QueryExecutor {
        QueryExecutor::new(ExecutorSettings::default())
    }

    fn client(driver: &Arc<ScriptedDriver>) -> GraphClient {
        GraphClient::from_driver(driver.clone())
    }

    #[test]
    fn test_effective_limit() {
        let exec = executor();
        assert_eq!(exec.effective_limit(None).unwrap(), 1000);
        assert_eq!(exec.effective_limit(Some(5)).unwrap(), 5);
        assert_eq!(exec.effective_limit(Some(50_000)).unwrap(), 10_000);
        assert_eq!(
            exec.effective_limit(Some(0)).unwrap_err().code(),
            "VALIDATION_ERROR"
        );
    }

    #[tokio::test]
    async fn test_truncation_when_more_rows_exist() {
        let driver = Arc::new(ScriptedDriver::new().on("MATCH", rows(5)));
        let result = executor()
            .execute_raw(
                &client(&driver),
                "MATCH (n:Patient) RETURN n.id AS id",
                Some(3),
                &SemanticCatalogSnapshot::default(),
            )
            .await
            .unwrap();

        assert_eq!(driver.last_max_rows(), 4);
        assert_eq!(result.row_count, 3);
        assert_eq!(result.rows.len(), 3);
        assert!(result.truncated);
    }

    #[tokio::test]
    async fn test_exact_fit_is_not_truncated() {
        let driver = Arc::new(ScriptedDriver::new().on("MATCH", rows(3)));
        let result = executor()
            .execute_raw(
                &client(&driver),
                "MATCH (n:Patient) RETURN n.id AS id",
                Some(3),
                &SemanticCatalogSnapshot::default(),
            )
            .await
            .unwrap();
        assert_eq!(result.row_count, 3);
        assert!(!result.truncated);
    }

    #[tokio::test]
    async fn test_default_and_clamped_limits_reach_driver() {
        let driver = Arc::new(ScriptedDriver::new().on("MATCH", rows(1)));
        let exec = executor();
        let catalog = SemanticCatalogSnapshot::default();

        exec.execute_raw(&client(&driver), "MATCH (n) RETURN n", None, &catalog)
            .await
            .unwrap();
        assert_eq!(driver.last_max_rows(), 1001);

        exec.execute_raw(&client(&driver), "MATCH (n) RETURN n", Some(1_000_000), &catalog)
            .await
            .unwrap();
        assert_eq!(driver.last_max_rows(), 10_001);
    }

    #[tokio::test]
    async fn test_validation_never_reaches_driver() {
        let driver = Arc::new(ScriptedDriver::new());
        let exec = executor();
        let catalog = SemanticCatalogSnapshot::default();

        for query in ["", "MATCH (n RETURN n", "MATCH (n) RETURN 'x", "hello"] {
            let err = exec
                .execute_raw(&client(&driver), query, None, &catalog)
                .await
                .unwrap_err();
            assert_eq!(err.code(), "VALIDATION_ERROR", "query {query:?}");
        }
        let err = exec
            .execute_raw(&client(&driver), "MATCH (n) RETURN n", Some(0), &catalog)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert_eq!(driver.call_count(), 0);
    }

    #[tokio::test]
    async fn test_writes_rejected_by_default() {
        let driver = Arc::new(ScriptedDriver::new());
        let err = executor()
            .execute_raw(
                &client(&driver),
                "MATCH (n:Patient) DETACH DELETE n",
                None,
                &SemanticCatalogSnapshot::default(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert!(err.public_message().contains("write clauses"));
        assert_eq!(driver.call_count(), 0);
    }

    #[tokio::test]
    async fn test_writes_allowed_when_configured() {
        let driver = Arc::new(ScriptedDriver::new());
        let exec = QueryExecutor::new(ExecutorSettings {
            allow_writes: true,
            ..ExecutorSettings::default()
        });
        let result = exec
            .execute_raw(
                &client(&driver),
                "CREATE (n:Patient {id: 'p-1'})",
                None,
                &SemanticCatalogSnapshot::default(),
            )
            .await
            .unwrap();
        assert_eq!(result.row_count, 0);
        assert!(result.pattern.is_write);
        assert_eq!(driver.call_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_return_rejected() {
        let driver = Arc::new(ScriptedDriver::new());
        let err = executor()
            .execute_raw(
                &client(&driver),
                "MATCH (n:Patient) WHERE n.age > 3",
                None,
                &SemanticCatalogSnapshot::default(),
            )
            .await
            .unwrap_err();
        assert!(err.public_message().contains("RETURN"));
    }

    #[tokio::test]
    async fn test_database_rejection_is_query_error() {
        let driver = Arc::new(ScriptedDriver::new().fail_on(
            "MATCH",
            GraphError::Query("Variable `m` not defined".into()),
        ));
        let err = executor()
            .execute_raw(
                &client(&driver),
                "MATCH (n) RETURN m",
                None,
                &SemanticCatalogSnapshot::default(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "QUERY_EXECUTION_ERROR");
        assert!(err.public_message().contains("not defined"));
    }

    #[tokio::test]
    async fn test_connection_failure_is_redacted() {
        let driver = Arc::new(ScriptedDriver::new().fail_on(
            "MATCH",
            GraphError::Connection("bolt://svc-user@10.0.0.4:7687 refused".into()),
        ));
        let err = executor()
            .execute_raw(
                &client(&driver),
                "MATCH (n) RETURN n",
                None,
                &SemanticCatalogSnapshot::default(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "GRAPH_CONNECTION_ERROR");
        assert!(!err.public_message().contains("svc-user"));
    }

    #[tokio::test]
    async fn test_empty_result_keeps_projection_columns() {
        let driver = Arc::new(ScriptedDriver::new());
        let result = executor()
            .execute_raw(
                &client(&driver),
                "MATCH (n:Patient) RETURN n.name AS name, count(n) AS total",
                None,
                &SemanticCatalogSnapshot::default(),
            )
            .await
            .unwrap();
        assert_eq!(result.columns, vec!["name".to_string(), "total".to_string()]);
        assert_eq!(result.metadata.len(), 2);
        assert!(result
            .metadata
            .iter()
            .all(|m| m.data_type == DataType::String));
        assert!(!result.truncated);
    }

    #[tokio::test]
    async fn test_patient_count_is_aggregate() {
        let driver = Arc::new(ScriptedDriver::new().on(
            "count(n)",
            RowSet::new(vec!["total".into()], vec![vec![GraphValue::Integer(42)]]),
        ));
        let result = executor()
            .execute_raw(
                &client(&driver),
                "MATCH (n:Patient) RETURN count(n) AS total",
                None,
                &SemanticCatalogSnapshot::default(),
            )
            .await
            .unwrap();
        assert_eq!(result.pattern.grain, RowGrain::Aggregate);
        assert_eq!(result.metadata[0].data_type, DataType::Integer);
        assert_eq!(result.value(0, "total"), Some(&GraphValue::Integer(42)));
    }

    #[tokio::test]
    async fn test_projection_is_passed_to_driver() {
        let driver = Arc::new(ScriptedDriver::new());
        executor()
            .execute_raw(
                &client(&driver),
                "MATCH (n:Patient) RETURN n.name AS name, n AS patient",
                None,
                &SemanticCatalogSnapshot::default(),
            )
            .await
            .unwrap();
        assert_eq!(
            driver.calls()[0].projection,
            vec!["name".to_string(), "patient".to_string()]
        );
    }

    #[tokio::test]
    async fn test_unclassifiable_queries_degrade_to_unknown() {
        let driver = Arc::new(ScriptedDriver::new().on(
            "db.labels()",
            RowSet::new(vec!["label".into()], vec![vec![GraphValue::from("Patient")]]),
        ));
        let exec = executor();
        let catalog = SemanticCatalogSnapshot::default();

        let result = exec
            .execute_raw(
                &client(&driver),
                "CALL db.labels() YIELD label RETURN label",
                None,
                &catalog,
            )
            .await
            .unwrap();
        assert!(result.pattern.unknown);
        assert_eq!(result.columns, vec!["label".to_string()]);
        assert_eq!(result.metadata[0].data_type, DataType::String);
        assert_eq!(result.value(0, "label"), Some(&GraphValue::from("Patient")));

        let result = exec
            .execute_raw(&client(&driver), "MATCH (n:Ghost) RETURN *", None, &catalog)
            .await
            .unwrap();
        assert!(result.pattern.unknown);
        assert_eq!(result.row_count, 0);
        assert!(result
            .metadata
            .iter()
            .all(|m| m.data_type == DataType::String));
    }
}
