//! Configuration for the `ontograph` command-line tool.

use std::path::PathBuf;

use serde::Deserialize;

/// Tool-specific settings.
///
/// Loaded from the `[cli]` section of `ontograph.toml` or `ONTOGRAPH__CLI__*`
/// environment variables. Graph, vault, and executor settings come from the
/// shared `ontograph_core::config::Settings`.
#[derive(Debug, Clone, Deserialize)]
pub struct CliConfig {
    /// JSON registry of ontologies, workspaces, and catalogs.
    #[serde(default = "default_registry")]
    pub registry: PathBuf,

    /// Tenant used when `--tenant-id` is not given.
    #[serde(default)]
    pub tenant_id: String,
}

fn default_registry() -> PathBuf {
    PathBuf::from("ontograph-registry.json")
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            registry: default_registry(),
            tenant_id: String::new(),
        }
    }
}

impl CliConfig {
    pub fn load(file_prefix: &str) -> anyhow::Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::File::with_name(file_prefix).required(false))
            .add_source(
                config::Environment::with_prefix("ONTOGRAPH")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        match cfg.get::<CliConfig>("cli") {
            Ok(c) => Ok(c),
            Err(_) => Ok(CliConfig::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_default_config() {
        let config = CliConfig::default();
        assert_eq!(config.registry, PathBuf::from("ontograph-registry.json"));
        assert!(config.tenant_id.is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[cli]\nregistry = \"/srv/ontograph/registry.json\"\ntenant_id = \"6f1c1f6e-5d43-4b1e-9a36-0d7b2f1c9e11\""
        )
        .unwrap();
        let prefix = file.path().with_extension("");

        let config = CliConfig::load(prefix.to_str().unwrap()).unwrap();
        assert_eq!(config.registry, PathBuf::from("/srv/ontograph/registry.json"));
        assert_eq!(config.tenant_id, "6f1c1f6e-5d43-4b1e-9a36-0d7b2f1c9e11");
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("absent");
        let config = CliConfig::load(prefix.to_str().unwrap()).unwrap();
        assert_eq!(config.registry, PathBuf::from("ontograph-registry.json"));
    }
}
