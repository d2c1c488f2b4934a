//! Per-key connection cache.
//!
//! Each cache key owns a slot: a generation counter and an async mutex over
//! the cached client. Concurrent misses on one key queue on that slot's
//! mutex and converge on a single constructed client; different keys never
//! contend. A builder records the generation before it reads credentials and
//! stores its client only if the generation is unchanged once the client is
//! built, so a credential change racing a rebuild can never leave a client
//! built from the old credentials in the cache.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info};

use ontograph_core::{OntologyId, TenantId};
use ontograph_graph::{GraphClient, GraphConfig, GraphError};

use crate::error::Result;

/// What a cached client belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Ontology(OntologyId),
    TenantDefault(TenantId),
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ontology(id) => write!(f, "ontology:{id}"),
            Self::TenantDefault(id) => write!(f, "tenant-default:{id}"),
        }
    }
}

/// Everything needed to build a client for one key.
#[derive(Debug, Clone)]
pub struct ConnectionSpec {
    pub tenant_id: TenantId,
    pub config: GraphConfig,
}

/// A live client and where it came from.
#[derive(Debug, Clone)]
pub struct CachedClient {
    pub key: CacheKey,
    pub tenant_id: TenantId,
    pub client: GraphClient,
    pub created_at: DateTime<Utc>,
    /// Non-secret digest of the key and endpoint, safe for logs.
    pub fingerprint: String,
    generation: u64,
}

/// Builds graph clients. Production uses [`Neo4jConnector`].
#[async_trait]
pub trait ClientFactory: Send + Sync {
    async fn connect(
        &self,
        key: &CacheKey,
        config: &GraphConfig,
    ) -> std::result::Result<GraphClient, GraphError>;
}

/// Pooled `neo4rs` clients.
pub struct Neo4jConnector;

#[async_trait]
impl ClientFactory for Neo4jConnector {
    async fn connect(
        &self,
        key: &CacheKey,
        config: &GraphConfig,
    ) -> std::result::Result<GraphClient, GraphError> {
        debug!(key = %key, uri = %config.uri, "Opening graph connection pool");
        GraphClient::connect(config).await
    }
}

#[derive(Default)]
struct Slot {
    generation: AtomicU64,
    entry: Mutex<Option<CachedClient>>,
}

pub struct ConnectionCache {
    slots: DashMap<CacheKey, Arc<Slot>>,
    factory: Arc<dyn ClientFactory>,
}

impl ConnectionCache {
    pub fn new(factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            slots: DashMap::new(),
            factory,
        }
    }

    fn slot(&self, key: CacheKey) -> Arc<Slot> {
        Arc::clone(self.slots.entry(key).or_default().value())
    }

    /// Return the valid cached client for `key`, or build one.
    ///
    /// `load` runs only on a miss, under the key's lock, and yields the
    /// connection to build. `Ok(None)` from `load` means the key has nothing
    /// to build (for example an ontology without an override) and is passed
    /// through without caching anything.
    pub async fn get_or_connect<F, Fut>(&self, key: CacheKey, load: F) -> Result<Option<CachedClient>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<ConnectionSpec>>>,
    {
        let slot = self.slot(key);
        let mut entry = slot.entry.lock().await;
        let generation = slot.generation.load(Ordering::SeqCst);

        if let Some(cached) = entry.as_ref() {
            if cached.generation == generation {
                return Ok(Some(cached.clone()));
            }
            debug!(key = %key, fingerprint = %cached.fingerprint, "Evicting stale graph client");
            *entry = None;
        }

        let Some(spec) = load().await? else {
            return Ok(None);
        };
        let client = self.factory.connect(&key, &spec.config).await?;
        let cached = CachedClient {
            key,
            tenant_id: spec.tenant_id,
            client,
            created_at: Utc::now(),
            fingerprint: fingerprint(&key, &spec.config),
            generation,
        };

        if slot.generation.load(Ordering::SeqCst) == generation {
            info!(key = %key, fingerprint = %cached.fingerprint, "Graph client cached");
            *entry = Some(cached.clone());
        } else {
            debug!(key = %key, "Credentials changed while connecting; client not cached");
        }
        Ok(Some(cached))
    }

    /// Mark the entry for `key` invalid and evict it.
    ///
    /// The generation bump takes effect immediately. If a builder currently
    /// holds the slot, it sees the new generation and discards its client;
    /// a reader holding the slot leaves a stale entry that the next lookup
    /// evicts. Returns whether an entry was evicted here.
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        let Some(slot) = self.slots.get(key).map(|s| Arc::clone(s.value())) else {
            return false;
        };
        slot.generation.fetch_add(1, Ordering::SeqCst);
        let evicted = match slot.entry.try_lock() {
            Ok(mut entry) => entry.take().is_some(),
            Err(_) => false,
        };
        debug!(key = %key, evicted, "Graph client invalidated");
        evicted
    }

    /// Number of valid cached clients.
    pub fn cached_len(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| {
                let generation = slot.generation.load(Ordering::SeqCst);
                slot.entry
                    .try_lock()
                    .map(|entry| matches!(&*entry, Some(c) if c.generation == generation))
                    .unwrap_or(false)
            })
            .count()
    }

    /// Invalidate every entry.
    pub fn clear(&self) {
        let keys: Vec<CacheKey> = self.slots.iter().map(|s| *s.key()).collect();
        for key in keys {
            self.invalidate(&key);
        }
    }
}

fn fingerprint(key: &CacheKey, config: &GraphConfig) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(key.to_string().as_bytes());
    hasher.update(b"\0");
    hasher.update(config.uri.as_bytes());
    hasher.update(b"\0");
    hasher.update(config.user.as_bytes());
    hasher.finalize().to_hex().as_str()[..16].to_string()
}
