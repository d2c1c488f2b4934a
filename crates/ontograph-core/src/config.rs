//! Configuration management for Ontograph services.
//!
//! Configuration is loaded from (in priority order):
//! 1. Environment variables (`ONTOGRAPH__` prefix, `__` separator)
//! 2. Config file (`ontograph.toml`, optional)
//! 3. Defaults

use std::collections::HashMap;
use std::fmt;

use serde::Deserialize;

use crate::error::{CoreError, Result};
use crate::types::TenantId;

/// Top-level settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    /// Process-wide default graph connection.
    #[serde(default)]
    pub neo4j: Neo4jSettings,

    /// Per-tenant default connections, keyed by tenant UUID.
    #[serde(default)]
    pub tenants: HashMap<String, Neo4jSettings>,

    #[serde(default)]
    pub vault: VaultSettings,

    #[serde(default)]
    pub executor: ExecutorSettings,

    #[serde(default)]
    pub schema: SchemaSettings,
}

impl Settings {
    /// Load settings from `<file_prefix>.toml` (if present) and the
    /// environment.
    pub fn load(file_prefix: &str) -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::File::with_name(file_prefix).required(false))
            .add_source(
                config::Environment::with_prefix("ONTOGRAPH")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("vault.previous_keys"),
            )
            .build()
            .map_err(|e| CoreError::Config(e.to_string()))?;

        let settings: Self = cfg
            .try_deserialize()
            .map_err(|e| CoreError::Config(e.to_string()))?;
        tracing::debug!(
            file_prefix,
            tenant_overrides = settings.tenants.len(),
            "Settings loaded"
        );
        Ok(settings)
    }

    /// The default connection for a tenant: its own override if configured,
    /// otherwise the process-wide default.
    pub fn tenant_default(&self, tenant_id: &TenantId) -> &Neo4jSettings {
        self.tenants
            .iter()
            .find(|(key, _)| key.parse::<TenantId>().ok().as_ref() == Some(tenant_id))
            .map(|(_, settings)| settings)
            .unwrap_or(&self.neo4j)
    }
}

/// Connection parameters for one Neo4j instance.
#[derive(Clone, Deserialize)]
pub struct Neo4jSettings {
    #[serde(default = "default_uri")]
    pub uri: String,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_fetch_size")]
    pub fetch_size: usize,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl fmt::Debug for Neo4jSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Neo4jSettings")
            .field("uri", &self.uri)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("max_connections", &self.max_connections)
            .field("fetch_size", &self.fetch_size)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}

impl Default for Neo4jSettings {
    fn default() -> Self {
        Self {
            uri: default_uri(),
            user: default_user(),
            password: String::new(),
            max_connections: default_max_connections(),
            fetch_size: default_fetch_size(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

/// Secret vault key material.
#[derive(Clone, Default, Deserialize)]
pub struct VaultSettings {
    /// Base64-encoded 32-byte key used for encryption.
    #[serde(default)]
    pub key: String,
    /// Older keys still accepted for decryption during rotation.
    #[serde(default)]
    pub previous_keys: Vec<String>,
}

impl fmt::Debug for VaultSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultSettings")
            .field("key", &"<redacted>")
            .field("previous_keys", &self.previous_keys.len())
            .finish()
    }
}

/// Raw query execution policy.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutorSettings {
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,
    /// Allow write clauses in caller-supplied query text.
    #[serde(default)]
    pub allow_writes: bool,
    /// Number of result rows used to collect example values.
    #[serde(default = "default_sample_rows")]
    pub sample_rows: usize,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: default_max_limit(),
            allow_writes: false,
            sample_rows: default_sample_rows(),
        }
    }
}

/// Schema aggregation tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct SchemaSettings {
    /// Relationships sampled per type to observe endpoint labels.
    #[serde(default = "default_endpoint_sample")]
    pub endpoint_sample_size: usize,
    /// Labels/types introspected concurrently.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for SchemaSettings {
    fn default() -> Self {
        Self {
            endpoint_sample_size: default_endpoint_sample(),
            concurrency: default_concurrency(),
        }
    }
}

fn default_uri() -> String {
    "bolt://localhost:7687".to_string()
}

fn default_user() -> String {
    "neo4j".to_string()
}

fn default_max_connections() -> u32 {
    16
}

fn default_fetch_size() -> usize {
    256
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_limit() -> usize {
    1000
}

fn default_max_limit() -> usize {
    10_000
}

fn default_sample_rows() -> usize {
    3
}

fn default_endpoint_sample() -> usize {
    1000
}

fn default_concurrency() -> usize {
    4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.neo4j.uri, "bolt://localhost:7687");
        assert_eq!(settings.executor.default_limit, 1000);
        assert_eq!(settings.executor.max_limit, 10_000);
        assert!(!settings.executor.allow_writes);
        assert_eq!(settings.schema.concurrency, 4);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let settings = Neo4jSettings {
            password: "hunter2".to_string(),
            ..Default::default()
        };
        let vault = VaultSettings {
            key: "c2VjcmV0".to_string(),
            previous_keys: vec![],
        };
        assert!(!format!("{settings:?}").contains("hunter2"));
        assert!(!format!("{vault:?}").contains("c2VjcmV0"));
    }

    #[test]
    fn test_load_from_file_with_tenant_override() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("ontograph");
        let tenant = TenantId::new();
        std::fs::write(
            prefix.with_extension("toml"),
            format!(
                r#"
[neo4j]
uri = "bolt://shared:7687"
password = "shared"

[tenants."{tenant}"]
uri = "bolt://tenant-a:7687"
user = "a"
password = "a-secret"

[executor]
default_limit = 50
"#
            ),
        )
        .unwrap();

        let settings = Settings::load(prefix.to_str().unwrap()).unwrap();
        assert_eq!(settings.executor.default_limit, 50);
        assert_eq!(settings.tenant_default(&tenant).uri, "bolt://tenant-a:7687");
        assert_eq!(
            settings.tenant_default(&TenantId::new()).uri,
            "bolt://shared:7687"
        );
    }
}
