//! Neo4j connection management and shared graph client.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use neo4rs::{ConfigBuilder, Graph};
use tokio_util::sync::CancellationToken;
use zeroize::Zeroizing;

use ontograph_core::config::Neo4jSettings;
use ontograph_core::GraphValue;

use crate::cypher::Statement;
use crate::value;

/// Errors from graph operations.
///
/// `Connection` and `Authentication` carry driver detail for server-side
/// logs only; callers outside this layer receive a generic message.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GraphError {
    #[error("Neo4j connection error: {0}")]
    Connection(String),

    #[error("Neo4j authentication error: {0}")]
    Authentication(String),

    #[error("Neo4j query error: {0}")]
    Query(String),

    #[error("Node not found: {label} with id {id}")]
    NotFound { label: String, id: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Graph operation cancelled")]
    Cancelled,
}

impl From<neo4rs::Error> for GraphError {
    fn from(err: neo4rs::Error) -> Self {
        classify_driver_error(&err.to_string())
    }
}

/// Sort a driver failure into connection, authentication, or query errors
/// using the Neo4j status code embedded in its message.
pub fn classify_driver_error(message: &str) -> GraphError {
    let lower = message.to_ascii_lowercase();
    if message.contains("Neo.ClientError.Security")
        || lower.contains("authentication")
        || lower.contains("unauthorized")
    {
        return GraphError::Authentication(message.to_string());
    }
    if message.contains("Neo.TransientError.General.DatabaseUnavailable")
        || message.contains("Neo.ClientError.Database.DatabaseNotFound")
    {
        return GraphError::Connection(message.to_string());
    }
    if message.contains("Neo.ClientError")
        || message.contains("Neo.DatabaseError")
        || message.contains("Neo.TransientError")
    {
        return GraphError::Query(message.to_string());
    }
    GraphError::Connection(message.to_string())
}

/// Configuration for connecting to Neo4j.
#[derive(Clone)]
pub struct GraphConfig {
    pub uri: String,
    pub user: String,
    /// Wiped on drop. The driver keeps its own copy for the pool's lifetime.
    pub password: Zeroizing<String>,
    pub max_connections: u32,
    pub fetch_size: usize,
    pub connect_timeout: Duration,
}

impl fmt::Debug for GraphConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphConfig")
            .field("uri", &self.uri)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("max_connections", &self.max_connections)
            .field("fetch_size", &self.fetch_size)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self::from(&Neo4jSettings::default())
    }
}

impl From<&Neo4jSettings> for GraphConfig {
    fn from(settings: &Neo4jSettings) -> Self {
        Self {
            uri: settings.uri.clone(),
            user: settings.user.clone(),
            password: Zeroizing::new(settings.password.clone()),
            max_connections: settings.max_connections,
            fetch_size: settings.fetch_size,
            connect_timeout: Duration::from_secs(settings.connect_timeout_secs),
        }
    }
}

/// Rows returned by a driver, in column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<GraphValue>>,
}

impl RowSet {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<GraphValue>>) -> Self {
        Self { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Iterate rows with access by column name.
    pub fn iter(&self) -> impl Iterator<Item = RowRef<'_>> {
        self.rows.iter().map(move |values| RowRef {
            columns: &self.columns,
            values,
        })
    }

    pub fn first(&self) -> Option<RowRef<'_>> {
        self.iter().next()
    }
}

/// One row of a [`RowSet`].
#[derive(Debug, Clone, Copy)]
pub struct RowRef<'a> {
    columns: &'a [String],
    values: &'a [GraphValue],
}

impl<'a> RowRef<'a> {
    pub fn get(&self, column: &str) -> Option<&'a GraphValue> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.values.get(idx)
    }

    pub fn get_str(&self, column: &str) -> Option<&'a str> {
        self.get(column).and_then(GraphValue::as_str)
    }

    pub fn get_i64(&self, column: &str) -> Option<i64> {
        self.get(column).and_then(GraphValue::as_i64)
    }

    pub fn get_strings(&self, column: &str) -> Vec<String> {
        self.get(column)
            .map(GraphValue::as_string_list)
            .unwrap_or_default()
    }
}

/// The transport seam: execute a statement and hand back rows.
#[async_trait]
pub trait GraphDriver: Send + Sync {
    /// Execute a statement and collect at most `max_rows` rows.
    async fn fetch(&self, statement: &Statement, max_rows: usize) -> Result<RowSet, GraphError>;

    /// Execute a statement whose result is not needed.
    async fn run(&self, statement: &Statement) -> Result<(), GraphError>;
}

/// The production driver over a pooled `neo4rs::Graph`.
pub struct Neo4jDriver {
    graph: Graph,
}

impl Neo4jDriver {
    /// Connect to Neo4j with the given configuration.
    pub async fn connect(config: &GraphConfig) -> Result<Self, GraphError> {
        let neo_config = ConfigBuilder::default()
            .uri(&config.uri)
            .user(&config.user)
            .password(config.password.as_str())
            .max_connections(config.max_connections as usize)
            .fetch_size(config.fetch_size)
            .build()
            .map_err(|e| GraphError::Connection(e.to_string()))?;

        let graph = tokio::time::timeout(config.connect_timeout, Graph::connect(neo_config))
            .await
            .map_err(|_| {
                GraphError::Connection(format!(
                    "timed out after {}s connecting to {}",
                    config.connect_timeout.as_secs(),
                    config.uri
                ))
            })??;

        tracing::info!(uri = %config.uri, "Connected to Neo4j");
        Ok(Self { graph })
    }
}

#[async_trait]
impl GraphDriver for Neo4jDriver {
    async fn fetch(&self, statement: &Statement, max_rows: usize) -> Result<RowSet, GraphError> {
        let mut stream = self.graph.execute(value::to_query(statement)).await?;
        let mut set = RowSet::default();
        while set.rows.len() < max_rows {
            let Some(row) = stream.next().await? else {
                break;
            };
            let fields = value::row_fields(&row)?;
            if set.columns.is_empty() {
                set.columns = value::order_columns(fields.keys(), &statement.projection);
            }
            set.rows.push(value::row_values(fields, &set.columns));
        }
        Ok(set)
    }

    async fn run(&self, statement: &Statement) -> Result<(), GraphError> {
        self.graph.run(value::to_query(statement)).await?;
        Ok(())
    }
}

/// Thread-safe graph client.
///
/// This is the single point of access for all graph operations of one
/// ontology's database. Clone is cheap (inner Arc). Every call races the
/// client's cancellation token; a cancelled call drops the in-flight
/// driver stream.
#[derive(Clone)]
pub struct GraphClient {
    driver: Arc<dyn GraphDriver>,
    cancel: CancellationToken,
}

impl fmt::Debug for GraphClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphClient")
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl GraphClient {
    /// Connect to Neo4j with the given configuration.
    pub async fn connect(config: &GraphConfig) -> Result<Self, GraphError> {
        let driver = Neo4jDriver::connect(config).await?;
        Ok(Self::from_driver(Arc::new(driver)))
    }

    /// Wrap an existing driver.
    pub fn from_driver(driver: Arc<dyn GraphDriver>) -> Self {
        Self {
            driver,
            cancel: CancellationToken::new(),
        }
    }

    /// A handle on the same connection whose calls observe `token`.
    pub fn with_cancellation(&self, token: &CancellationToken) -> Self {
        Self {
            driver: Arc::clone(&self.driver),
            cancel: token.clone(),
        }
    }

    /// True when both handles share one underlying connection.
    pub fn same_connection(&self, other: &GraphClient) -> bool {
        Arc::ptr_eq(&self.driver, &other.driver)
    }

    /// Execute a statement and collect at most `max_rows` rows.
    pub async fn fetch(&self, statement: Statement, max_rows: usize) -> Result<RowSet, GraphError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(GraphError::Cancelled),
            result = self.driver.fetch(&statement, max_rows) => result,
        }
    }

    /// Execute a read statement and collect all rows.
    pub async fn query_rows(&self, statement: Statement) -> Result<RowSet, GraphError> {
        self.fetch(statement, usize::MAX).await
    }

    /// Execute a read statement and return the first row, if any.
    pub async fn query_one(&self, statement: Statement) -> Result<RowSet, GraphError> {
        self.fetch(statement, 1).await
    }

    /// Execute a write-only statement (CREATE, MERGE, DELETE, SET).
    pub async fn run(&self, statement: Statement) -> Result<(), GraphError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(GraphError::Cancelled),
            result = self.driver.run(&statement) => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedDriver;

    #[test]
    fn test_classify_driver_errors() {
        assert!(matches!(
            classify_driver_error(
                "Neo4j error `Neo.ClientError.Security.Unauthorized`: The client is unauthorized"
            ),
            GraphError::Authentication(_)
        ));
        assert!(matches!(
            classify_driver_error(
                "Neo4j error `Neo.ClientError.Statement.SyntaxError`: Invalid input 'RETRN'"
            ),
            GraphError::Query(_)
        ));
        assert!(matches!(
            classify_driver_error("Neo.TransientError.General.DatabaseUnavailable"),
            GraphError::Connection(_)
        ));
        assert!(matches!(
            classify_driver_error("IO error: Connection refused (os error 111)"),
            GraphError::Connection(_)
        ));
    }

    #[test]
    fn test_config_debug_redacts_password() {
        let config = GraphConfig {
            password: Zeroizing::new("topsecret".to_string()),
            ..Default::default()
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("topsecret"));
        assert!(rendered.contains("bolt://localhost:7687"));
    }

    #[test]
    fn test_config_password_is_zeroizing() {
        let settings = Neo4jSettings {
            password: "from-settings".into(),
            ..Neo4jSettings::default()
        };
        let config = GraphConfig::from(&settings);
        let password: &Zeroizing<String> = &config.password;
        assert_eq!(password.as_str(), "from-settings");
    }

    #[test]
    fn test_row_ref_access() {
        let set = RowSet::new(
            vec!["label".into(), "cnt".into()],
            vec![vec![GraphValue::from("Patient"), GraphValue::Integer(3)]],
        );
        let row = set.first().unwrap();
        assert_eq!(row.get_str("label"), Some("Patient"));
        assert_eq!(row.get_i64("cnt"), Some(3));
        assert!(row.get("missing").is_none());
    }

    #[tokio::test]
    async fn test_cancelled_token_short_circuits() {
        let driver = Arc::new(ScriptedDriver::new().with_delay(Duration::from_secs(30)));
        let client = GraphClient::from_driver(driver.clone());
        let token = CancellationToken::new();
        let scoped = client.with_cancellation(&token);
        token.cancel();

        let err = scoped
            .fetch(Statement::new("MATCH (n) RETURN n"), 10)
            .await
            .unwrap_err();
        assert_eq!(err, GraphError::Cancelled);
        assert!(client.same_connection(&scoped));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_call() {
        let driver = Arc::new(ScriptedDriver::new().with_delay(Duration::from_secs(30)));
        let token = CancellationToken::new();
        let client = GraphClient::from_driver(driver).with_cancellation(&token);

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        let err = client
            .run(Statement::new("MATCH (n) DETACH DELETE n"))
            .await
            .unwrap_err();
        assert_eq!(err, GraphError::Cancelled);
    }
}
