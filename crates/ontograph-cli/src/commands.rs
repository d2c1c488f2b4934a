//! Command execution.
//!
//! Results go to `out` as JSON; logs go through `tracing`. Passwords are read
//! from `input` so they never appear in process arguments or shell history.

use std::io::{BufRead, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use ontograph_access::{ClientFactory, GraphAccessService, MemoryStore, Scope, Stores};
use ontograph_core::config::Settings;
use ontograph_core::{OntologyId, TenantId, WorkspaceId};
use ontograph_vault::{generate_key, SecretVault};

use crate::args::{Cli, Command, Target};
use crate::config::CliConfig;

pub async fn run<R: BufRead, W: Write>(
    cli: Cli,
    factory: Arc<dyn ClientFactory>,
    input: R,
    out: &mut W,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    if let Command::GenKey = cli.command {
        writeln!(out, "{}", generate_key())?;
        return Ok(());
    }

    let settings = Settings::load(&cli.config)?;
    let cli_config = CliConfig::load(&cli.config)?;
    let registry = cli.registry.clone().unwrap_or(cli_config.registry.clone());

    if let Command::SealPassword { ontology_id } = &cli.command {
        let ontology_id: OntologyId = ontology_id.parse()?;
        let vault = configured_vault(&settings)?;
        let password = read_password(input)?;
        if password.is_empty() {
            bail!("No password on stdin");
        }
        let sealed = vault.encrypt_bound(&password, &ontology_id.to_string())?;
        writeln!(out, "{sealed}")?;
        return Ok(());
    }

    let vault = match &cli.command {
        Command::SetConnection { .. } => configured_vault(&settings)?,
        _ => vault_or_ephemeral(&settings)?,
    };
    let store = load_registry(&registry)?;
    let service = GraphAccessService::new(settings, vault, Stores::memory(store.clone()), factory);

    match cli.command {
        Command::Query {
            target,
            limit,
            query,
        } => {
            let tenant_id = tenant(target.tenant_id.as_deref(), &cli_config)?;
            let result = service
                .execute_raw(tenant_id, &query, scope(&target)?, limit, cancel)
                .await?;
            info!(
                rows = result.row_count,
                truncated = result.truncated,
                "Query complete"
            );
            serde_json::to_writer_pretty(&mut *out, &result)?;
            writeln!(out)?;
        }
        Command::Schema { target } => {
            let tenant_id = tenant(target.tenant_id.as_deref(), &cli_config)?;
            let schema = service
                .get_schema(tenant_id, scope(&target)?, cancel)
                .await?;
            serde_json::to_writer_pretty(&mut *out, &schema)?;
            writeln!(out)?;
        }
        Command::SetConnection {
            tenant_id,
            ontology_id,
            uri,
            username,
        } => {
            let tenant_id = tenant(tenant_id.as_deref(), &cli_config)?;
            let ontology_id: OntologyId = ontology_id.parse()?;
            let password = read_password(input)?;
            service
                .set_ontology_connection(tenant_id, ontology_id, &uri, &username, &password)
                .await?;
            save_registry(&registry, &store)?;
            writeln!(out, "Connection override stored for ontology {ontology_id}")?;
        }
        Command::ClearConnection {
            tenant_id,
            ontology_id,
        } => {
            let tenant_id = tenant(tenant_id.as_deref(), &cli_config)?;
            let ontology_id: OntologyId = ontology_id.parse()?;
            let existed = service
                .clear_ontology_connection(tenant_id, ontology_id)
                .await?;
            save_registry(&registry, &store)?;
            if existed {
                writeln!(out, "Connection override removed for ontology {ontology_id}")?;
            } else {
                writeln!(out, "Ontology {ontology_id} had no connection override")?;
            }
        }
        Command::SealPassword { .. } | Command::GenKey => {}
    }

    Ok(())
}

fn tenant(raw: Option<&str>, config: &CliConfig) -> anyhow::Result<TenantId> {
    let raw = raw.unwrap_or(&config.tenant_id);
    if raw.trim().is_empty() {
        bail!("Tenant ID required: set --tenant-id or cli.tenant_id in config");
    }
    Ok(raw.parse()?)
}

fn scope(target: &Target) -> anyhow::Result<Scope> {
    let ontology_id = target
        .ontology_id
        .as_deref()
        .map(str::parse::<OntologyId>)
        .transpose()?;
    let workspace_id = target
        .workspace_id
        .as_deref()
        .map(str::parse::<WorkspaceId>)
        .transpose()?;
    Ok(Scope::from_ids(ontology_id, workspace_id))
}

fn configured_vault(settings: &Settings) -> anyhow::Result<SecretVault> {
    SecretVault::from_settings(&settings.vault)
        .context("A vault key is required; generate one with `ontograph gen-key` and set vault.key")
}

/// Without a configured key, stored overrides cannot be decrypted and
/// resolution falls back to tenant defaults.
fn vault_or_ephemeral(settings: &Settings) -> anyhow::Result<SecretVault> {
    if settings.vault.key.trim().is_empty() {
        warn!("vault.key is not set; connection overrides with passwords will use tenant defaults");
        return Ok(SecretVault::from_base64(&generate_key())?);
    }
    configured_vault(settings)
}

/// First line of `input`, without its line ending.
fn read_password<R: BufRead>(mut input: R) -> anyhow::Result<Zeroizing<String>> {
    let mut line = Zeroizing::new(String::new());
    input.read_line(&mut line).context("Reading password from stdin")?;
    let trimmed = line.trim_end_matches(['\r', '\n']).len();
    line.truncate(trimmed);
    Ok(line)
}

fn load_registry(path: &Path) -> anyhow::Result<Arc<MemoryStore>> {
    if !path.exists() {
        debug!(path = %path.display(), "No registry file; starting empty");
        return Ok(Arc::new(MemoryStore::new()));
    }
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Reading registry {}", path.display()))?;
    let store = MemoryStore::from_json(&text)
        .with_context(|| format!("Parsing registry {}", path.display()))?;
    Ok(Arc::new(store))
}

/// Write the registry through a sibling temp file so a crash never leaves
/// it half-written.
fn save_registry(path: &Path, store: &MemoryStore) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(&store.to_registry())?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).with_context(|| format!("Writing {}", tmp.display()))?;
    std::fs::rename(&tmp, path).with_context(|| format!("Replacing {}", path.display()))?;
    debug!(path = %path.display(), "Registry saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::path::PathBuf;

    use async_trait::async_trait;
    use clap::Parser;

    use ontograph_access::{CacheKey, ConnectionStore, Registry};
    use ontograph_core::{GraphValue, OntologyRecord};
    use ontograph_graph::testing::ScriptedDriver;
    use ontograph_graph::{GraphClient, GraphConfig, GraphError, RowSet};

    use super::*;

    /// Answers every query with the URI the client was built from.
    struct EchoFactory;

    #[async_trait]
    impl ClientFactory for EchoFactory {
        async fn connect(
            &self,
            _key: &CacheKey,
            config: &GraphConfig,
        ) -> Result<GraphClient, GraphError> {
            let driver = ScriptedDriver::new().on(
                "RETURN",
                RowSet::new(
                    vec!["source".into()],
                    vec![vec![GraphValue::from(config.uri.as_str())]],
                ),
            );
            Ok(GraphClient::from_driver(Arc::new(driver)))
        }
    }

    struct Workspace {
        dir: tempfile::TempDir,
        ontology: OntologyId,
    }

    impl Workspace {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let tenant = TenantId::new();
            let ontology = OntologyId::new();

            let registry = Registry {
                ontologies: vec![OntologyRecord {
                    id: ontology,
                    tenant_id: tenant,
                    name: "clinical".into(),
                    connection: None,
                }],
                ..Registry::default()
            };
            std::fs::write(
                dir.path().join("registry.json"),
                serde_json::to_string(&registry).unwrap(),
            )
            .unwrap();
            std::fs::write(
                dir.path().join("ontograph.toml"),
                format!(
                    "[neo4j]\nuri = \"bolt://default:7687\"\n\n[vault]\nkey = \"{}\"\n\n[cli]\nregistry = \"{}\"\ntenant_id = \"{}\"\n",
                    generate_key(),
                    dir.path().join("registry.json").display(),
                    tenant
                ),
            )
            .unwrap();
            Self { dir, ontology }
        }

        fn prefix(&self) -> String {
            self.dir.path().join("ontograph").display().to_string()
        }

        fn registry(&self) -> PathBuf {
            self.dir.path().join("registry.json")
        }

        async fn run(&self, args: &[&str], stdin: &str) -> anyhow::Result<String> {
            let prefix = self.prefix();
            let mut argv = vec!["ontograph", "--config", prefix.as_str()];
            argv.extend_from_slice(args);
            let cli = Cli::parse_from(argv);

            let mut out = Vec::new();
            run(
                cli,
                Arc::new(EchoFactory),
                Cursor::new(stdin.as_bytes().to_vec()),
                &mut out,
                &CancellationToken::new(),
            )
            .await?;
            Ok(String::from_utf8(out).unwrap())
        }
    }

    #[tokio::test]
    async fn test_gen_key_prints_usable_key() {
        let ws = Workspace::new();
        let out = ws.run(&["gen-key"], "").await.unwrap();
        assert!(SecretVault::from_base64(out.trim()).is_ok());
    }

    #[tokio::test]
    async fn test_query_prints_json_result() {
        let ws = Workspace::new();
        let ontology = ws.ontology.to_string();
        let out = ws
            .run(
                &["query", "--ontology-id", &ontology, "RETURN 1 AS source"],
                "",
            )
            .await
            .unwrap();

        let json: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(json["columns"][0], "source");
        assert_eq!(json["rowCount"], 1);
        assert_eq!(json["truncated"], false);
    }

    #[tokio::test]
    async fn test_query_validation_error_surfaces() {
        let ws = Workspace::new();
        let err = ws
            .run(&["query", "MATCH (n) DETACH DELETE n"], "")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("write clauses"));
    }

    #[tokio::test]
    async fn test_set_and_clear_connection_update_registry() {
        let ws = Workspace::new();
        let ontology = ws.ontology.to_string();

        ws.run(
            &[
                "set-connection",
                "--ontology-id",
                &ontology,
                "--uri",
                "bolt://override:7687",
                "--username",
                "svc",
            ],
            "s3cret-pw\n",
        )
        .await
        .unwrap();

        let text = std::fs::read_to_string(ws.registry()).unwrap();
        assert!(!text.contains("s3cret-pw"));
        let store = MemoryStore::from_json(&text).unwrap();
        let record = store.ontology(&ws.ontology).await.unwrap().unwrap();
        let connection = record.connection.unwrap();
        assert_eq!(connection.uri, "bolt://override:7687");
        assert!(connection.encrypted_password.is_some());

        let out = ws
            .run(
                &["query", "--ontology-id", &ontology, "RETURN 1 AS source"],
                "",
            )
            .await
            .unwrap();
        assert!(out.contains("bolt://override:7687"));

        let out = ws
            .run(&["clear-connection", "--ontology-id", &ontology], "")
            .await
            .unwrap();
        assert!(out.contains("removed"));
        let store = MemoryStore::from_json(&std::fs::read_to_string(ws.registry()).unwrap()).unwrap();
        let record = store.ontology(&ws.ontology).await.unwrap().unwrap();
        assert!(record.connection.is_none());
    }

    #[tokio::test]
    async fn test_seal_password_round_trips() {
        let ws = Workspace::new();
        let ontology = ws.ontology.to_string();
        let sealed = ws
            .run(&["seal-password", "--ontology-id", &ontology], "hunter2\r\n")
            .await
            .unwrap();
        assert!(!sealed.contains("hunter2"));

        let settings = Settings::load(&ws.prefix()).unwrap();
        let vault = SecretVault::from_settings(&settings.vault).unwrap();
        let plain = vault.decrypt_bound(sealed.trim(), &ontology).unwrap();
        assert_eq!(plain.as_str(), "hunter2");
    }

    #[tokio::test]
    async fn test_missing_tenant_is_reported() {
        let ws = Workspace::new();
        std::fs::write(ws.dir.path().join("ontograph.toml"), "[neo4j]\n").unwrap();
        let err = ws.run(&["schema"], "").await.unwrap_err();
        assert!(err.to_string().contains("Tenant ID required"));
    }

    #[test]
    fn test_read_password_strips_line_ending() {
        let password = read_password(Cursor::new(b"pw with spaces \r\nnext".to_vec())).unwrap();
        assert_eq!(password.as_str(), "pw with spaces ");
    }

    #[test]
    fn test_scope_prefers_ontology() {
        let ontology = OntologyId::new();
        let target = Target {
            tenant_id: None,
            ontology_id: Some(ontology.to_string()),
            workspace_id: Some(WorkspaceId::new().to_string()),
        };
        assert_eq!(scope(&target).unwrap(), Scope::Ontology(ontology));
        assert_eq!(scope(&Target::default()).unwrap(), Scope::Tenant);
        assert!(scope(&Target {
            ontology_id: Some("not-a-uuid".into()),
            ..Target::default()
        })
        .is_err());
    }

    #[test]
    fn test_missing_registry_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = load_registry(&dir.path().join("absent.json")).unwrap();
        assert!(store.to_registry().ontologies.is_empty());
    }
}
