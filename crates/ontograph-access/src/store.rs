//! Relational seams consumed by the access layer.
//!
//! Ontology rows, workspace rows, and the semantic catalog live in the
//! application's own store. The access layer only needs the narrow views
//! below. [`MemoryStore`] implements all three for tests and the CLI.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use ontograph_core::{
    OntologyGraphConnection, OntologyId, OntologyRecord, SemanticCatalogSnapshot, TenantId,
    WorkspaceId, WorkspaceRecord,
};

use crate::error::{AccessError, Result};

/// Ontology rows and their optional graph connection override.
#[async_trait]
pub trait ConnectionStore: Send + Sync {
    async fn ontology(&self, id: &OntologyId) -> Result<Option<OntologyRecord>>;

    /// Insert or replace the connection override of an existing ontology.
    async fn save_connection(&self, connection: OntologyGraphConnection) -> Result<()>;

    /// Remove the override. Returns whether one existed.
    async fn clear_connection(&self, id: &OntologyId) -> Result<bool>;
}

#[async_trait]
pub trait WorkspaceDirectory: Send + Sync {
    async fn workspace(&self, id: &WorkspaceId) -> Result<Option<WorkspaceRecord>>;
}

#[async_trait]
pub trait SemanticCatalog: Send + Sync {
    /// The tenant's catalog. Tenants without one get an empty snapshot.
    async fn catalog(&self, tenant_id: &TenantId) -> Result<SemanticCatalogSnapshot>;
}

/// A tenant's catalog as it appears in a registry file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantCatalog {
    pub tenant_id: TenantId,
    #[serde(flatten)]
    pub catalog: SemanticCatalogSnapshot,
}

/// Serialized form of a [`MemoryStore`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Registry {
    #[serde(default)]
    pub ontologies: Vec<OntologyRecord>,
    #[serde(default)]
    pub workspaces: Vec<WorkspaceRecord>,
    #[serde(default)]
    pub catalogs: Vec<TenantCatalog>,
}

#[derive(Default)]
struct Tables {
    ontologies: HashMap<OntologyId, OntologyRecord>,
    workspaces: HashMap<WorkspaceId, WorkspaceRecord>,
    catalogs: HashMap<TenantId, SemanticCatalogSnapshot>,
}

/// In-memory implementation of every store seam.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_registry(registry: Registry) -> Self {
        let store = Self::new();
        for ontology in registry.ontologies {
            store.insert_ontology(ontology);
        }
        for workspace in registry.workspaces {
            store.insert_workspace(workspace);
        }
        for entry in registry.catalogs {
            store.set_catalog(entry.tenant_id, entry.catalog);
        }
        store
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let registry: Registry = serde_json::from_str(text)
            .map_err(|e| AccessError::validation(format!("invalid registry: {e}")))?;
        Ok(Self::from_registry(registry))
    }

    /// Snapshot of the current contents.
    pub fn to_registry(&self) -> Registry {
        let tables = self.read();
        let mut registry = Registry {
            ontologies: tables.ontologies.values().cloned().collect(),
            workspaces: tables.workspaces.values().cloned().collect(),
            catalogs: tables
                .catalogs
                .iter()
                .map(|(tenant_id, catalog)| TenantCatalog {
                    tenant_id: *tenant_id,
                    catalog: catalog.clone(),
                })
                .collect(),
        };
        registry.ontologies.sort_by_key(|o| o.id.0);
        registry.workspaces.sort_by_key(|w| w.id.0);
        registry.catalogs.sort_by_key(|c| c.tenant_id.0);
        registry
    }

    pub fn insert_ontology(&self, ontology: OntologyRecord) {
        self.write().ontologies.insert(ontology.id, ontology);
    }

    pub fn insert_workspace(&self, workspace: WorkspaceRecord) {
        self.write().workspaces.insert(workspace.id, workspace);
    }

    pub fn set_catalog(&self, tenant_id: TenantId, catalog: SemanticCatalogSnapshot) {
        self.write().catalogs.insert(tenant_id, catalog);
    }

    // Every write is a single map insert or update, so the tables stay
    // consistent even if a writer panicked.
    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ConnectionStore for MemoryStore {
    async fn ontology(&self, id: &OntologyId) -> Result<Option<OntologyRecord>> {
        let tables = self.read();
        Ok(tables.ontologies.get(id).cloned())
    }

    async fn save_connection(&self, mut connection: OntologyGraphConnection) -> Result<()> {
        let mut tables = self.write();
        let ontology = tables
            .ontologies
            .get_mut(&connection.ontology_id)
            .ok_or_else(|| AccessError::not_found("ontology", connection.ontology_id))?;
        connection.updated_at = Utc::now();
        ontology.connection = Some(connection);
        Ok(())
    }

    async fn clear_connection(&self, id: &OntologyId) -> Result<bool> {
        let mut tables = self.write();
        let ontology = tables
            .ontologies
            .get_mut(id)
            .ok_or_else(|| AccessError::not_found("ontology", id))?;
        Ok(ontology.connection.take().is_some())
    }
}

#[async_trait]
impl WorkspaceDirectory for MemoryStore {
    async fn workspace(&self, id: &WorkspaceId) -> Result<Option<WorkspaceRecord>> {
        let tables = self.read();
        Ok(tables.workspaces.get(id).cloned())
    }
}

#[async_trait]
impl SemanticCatalog for MemoryStore {
    async fn catalog(&self, tenant_id: &TenantId) -> Result<SemanticCatalogSnapshot> {
        let tables = self.read();
        Ok(tables.catalogs.get(tenant_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ontology(tenant_id: TenantId) -> OntologyRecord {
        OntologyRecord {
            id: OntologyId::new(),
            tenant_id,
            name: "clinical".into(),
            connection: None,
        }
    }

    #[tokio::test]
    async fn test_save_and_clear_connection() {
        let store = MemoryStore::new();
        let record = ontology(TenantId::new());
        let id = record.id;
        store.insert_ontology(record);

        store
            .save_connection(OntologyGraphConnection {
                ontology_id: id,
                uri: "bolt://graph-a:7687".into(),
                username: "reader".into(),
                encrypted_password: Some("blob".into()),
                updated_at: Utc::now(),
            })
            .await
            .unwrap();

        let loaded = store.ontology(&id).await.unwrap().unwrap();
        assert_eq!(loaded.connection.unwrap().uri, "bolt://graph-a:7687");

        assert!(store.clear_connection(&id).await.unwrap());
        assert!(!store.clear_connection(&id).await.unwrap());
        assert!(store.ontology(&id).await.unwrap().unwrap().connection.is_none());
    }

    #[tokio::test]
    async fn test_save_connection_requires_ontology() {
        let store = MemoryStore::new();
        let err = store
            .save_connection(OntologyGraphConnection {
                ontology_id: OntologyId::new(),
                uri: "bolt://x:7687".into(),
                username: "u".into(),
                encrypted_password: None,
                updated_at: Utc::now(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_missing_catalog_is_empty() {
        let store = MemoryStore::new();
        assert!(store.catalog(&TenantId::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_registry_json_round_trip() {
        let tenant_id = TenantId::new();
        let record = ontology(tenant_id);
        let id = record.id;
        let store = MemoryStore::from_registry(Registry {
            ontologies: vec![record],
            workspaces: vec![WorkspaceRecord {
                id: WorkspaceId::new(),
                tenant_id,
                ontology_id: Some(id),
            }],
            catalogs: vec![],
        });

        let json = serde_json::to_string(&store.to_registry()).unwrap();
        let reloaded = MemoryStore::from_json(&json).unwrap();
        assert_eq!(reloaded.ontology(&id).await.unwrap().unwrap().tenant_id, tenant_id);
        assert_eq!(reloaded.to_registry().workspaces.len(), 1);
    }

    #[test]
    fn test_invalid_registry_is_validation_error() {
        let err = MemoryStore::from_json("{not json").err().unwrap();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_poisoned_lock_keeps_contents() {
        let store = std::sync::Arc::new(MemoryStore::new());
        let record = ontology(TenantId::new());
        let id = record.id;
        store.insert_ontology(record);

        let poisoner = store.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.tables.write().unwrap();
            panic!("writer died holding the lock");
        })
        .join();
        assert!(store.tables.is_poisoned());

        store.insert_workspace(WorkspaceRecord {
            id: WorkspaceId::new(),
            tenant_id: TenantId::new(),
            ontology_id: Some(id),
        });
        let registry = store.to_registry();
        assert_eq!(registry.ontologies.len(), 1);
        assert_eq!(registry.workspaces.len(), 1);
        assert!(store.ontology(&id).await.unwrap().is_some());
    }
}
