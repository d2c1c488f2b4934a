//! Resolve the graph client for a tenant's ontology or workspace.
//!
//! Precedence: an ontology's own connection override, then the tenant's
//! default connection. Records belonging to another tenant resolve as not
//! found.

use std::sync::Arc;

use tracing::{debug, warn};

use ontograph_core::config::Settings;
use ontograph_core::{OntologyId, TenantId, WorkspaceId};
use ontograph_graph::GraphConfig;
use ontograph_vault::SecretVault;

use crate::cache::{CacheKey, CachedClient, ConnectionCache, ConnectionSpec};
use crate::error::{AccessError, Result};
use crate::store::{ConnectionStore, WorkspaceDirectory};

/// Which graph a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scope {
    Ontology(OntologyId),
    Workspace(WorkspaceId),
    /// The tenant's default graph.
    #[default]
    Tenant,
}

impl Scope {
    /// Explicit ontology wins over workspace; neither means the tenant default.
    pub fn from_ids(ontology_id: Option<OntologyId>, workspace_id: Option<WorkspaceId>) -> Self {
        match (ontology_id, workspace_id) {
            (Some(id), _) => Self::Ontology(id),
            (None, Some(id)) => Self::Workspace(id),
            (None, None) => Self::Tenant,
        }
    }
}

pub struct ConnectionResolver {
    cache: ConnectionCache,
    connections: Arc<dyn ConnectionStore>,
    workspaces: Arc<dyn WorkspaceDirectory>,
    vault: SecretVault,
    settings: Arc<Settings>,
}

impl ConnectionResolver {
    pub fn new(
        cache: ConnectionCache,
        connections: Arc<dyn ConnectionStore>,
        workspaces: Arc<dyn WorkspaceDirectory>,
        vault: SecretVault,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            cache,
            connections,
            workspaces,
            vault,
            settings,
        }
    }

    pub fn cache(&self) -> &ConnectionCache {
        &self.cache
    }

    pub fn vault(&self) -> &SecretVault {
        &self.vault
    }

    pub async fn resolve(&self, tenant_id: TenantId, scope: Scope) -> Result<CachedClient> {
        match scope {
            Scope::Ontology(id) => self.resolve_ontology(tenant_id, id).await,
            Scope::Workspace(id) => self.resolve_workspace(tenant_id, id).await,
            Scope::Tenant => self.resolve_default(tenant_id).await,
        }
    }

    pub async fn resolve_ontology(
        &self,
        tenant_id: TenantId,
        ontology_id: OntologyId,
    ) -> Result<CachedClient> {
        let key = CacheKey::Ontology(ontology_id);
        let outcome = self
            .cache
            .get_or_connect(key, || self.load_override(tenant_id, ontology_id))
            .await?;

        match outcome {
            Some(cached) if cached.tenant_id == tenant_id => Ok(cached),
            Some(_) => {
                warn!(%tenant_id, %ontology_id, "Ontology requested by a foreign tenant");
                Err(AccessError::not_found("ontology", ontology_id))
            }
            None => self.resolve_default(tenant_id).await,
        }
    }

    pub async fn resolve_workspace(
        &self,
        tenant_id: TenantId,
        workspace_id: WorkspaceId,
    ) -> Result<CachedClient> {
        let workspace = self
            .workspaces
            .workspace(&workspace_id)
            .await?
            .filter(|w| w.tenant_id == tenant_id)
            .ok_or_else(|| AccessError::not_found("workspace", workspace_id))?;

        match workspace.ontology_id {
            Some(ontology_id) => self.resolve_ontology(tenant_id, ontology_id).await,
            None => self.resolve_default(tenant_id).await,
        }
    }

    pub async fn resolve_default(&self, tenant_id: TenantId) -> Result<CachedClient> {
        let key = CacheKey::TenantDefault(tenant_id);
        let settings = Arc::clone(&self.settings);
        self.cache
            .get_or_connect(key, || async move {
                Ok(Some(ConnectionSpec {
                    tenant_id,
                    config: GraphConfig::from(settings.tenant_default(&tenant_id)),
                }))
            })
            .await?
            .ok_or_else(|| AccessError::internal(format!("no client built for {key}")))
    }

    /// Confirm an ontology exists and belongs to the tenant.
    pub async fn owned_ontology(
        &self,
        tenant_id: TenantId,
        ontology_id: OntologyId,
    ) -> Result<ontograph_core::OntologyRecord> {
        self.connections
            .ontology(&ontology_id)
            .await?
            .filter(|o| o.tenant_id == tenant_id)
            .ok_or_else(|| AccessError::not_found("ontology", ontology_id))
    }

    /// Read the override for a cache miss. `None` means use the tenant default.
    async fn load_override(
        &self,
        tenant_id: TenantId,
        ontology_id: OntologyId,
    ) -> Result<Option<ConnectionSpec>> {
        let record = self.owned_ontology(tenant_id, ontology_id).await?;
        let Some(connection) = record.connection else {
            debug!(%ontology_id, "No connection override; using tenant default");
            return Ok(None);
        };

        let password = match connection.encrypted_password.as_deref() {
            None => Default::default(),
            Some(blob) => match self.vault.decrypt_bound(blob, &ontology_id.to_string()) {
                Ok(plaintext) => plaintext,
                Err(e) => {
                    warn!(
                        %ontology_id,
                        error = %e,
                        "Stored graph credentials unusable; falling back to tenant default"
                    );
                    return Ok(None);
                }
            },
        };

        let defaults = self.settings.tenant_default(&tenant_id);
        Ok(Some(ConnectionSpec {
            tenant_id,
            config: GraphConfig {
                uri: connection.uri,
                user: connection.username,
                password,
                ..GraphConfig::from(defaults)
            },
        }))
    }
}
