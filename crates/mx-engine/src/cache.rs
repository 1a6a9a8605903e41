//! Result cache coordination
//!
//! Keys hash the metric definition, parameter values, data model version,
//! and consumer context, so a definition or data model change never serves
//! stale rows. Expired entries are dropped lazily on read. Concurrent
//! requests for one key share a single computation.

use crate::error::{EngineError, EngineResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mx_sql::ParameterValues;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

/// Everything a cache key is derived from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheKeyInputs {
    /// Hash of the resolved metric definition
    pub definition_hash: String,
    /// Parameter values (sorted by name)
    pub parameters: ParameterValues,
    /// Data model version from the project config
    pub data_model_version: String,
    /// Consumer context (dashboard, user, API client)
    pub consumer: Option<String>,
}

impl CacheKeyInputs {
    /// Inputs with no parameters and no consumer
    pub fn new(definition_hash: &str, data_model_version: &str) -> Self {
        Self {
            definition_hash: definition_hash.to_string(),
            parameters: ParameterValues::new(),
            data_model_version: data_model_version.to_string(),
            consumer: None,
        }
    }

    /// Set the parameter values
    pub fn with_parameters(mut self, parameters: ParameterValues) -> Self {
        self.parameters = parameters;
        self
    }

    /// Set the consumer context
    pub fn with_consumer(mut self, consumer: Option<String>) -> Self {
        self.consumer = consumer;
        self
    }

    /// SHA-256 cache key.
    ///
    /// `parameters` is a `BTreeMap`, so insertion order never changes the key.
    pub fn key(&self) -> String {
        let canonical = serde_json::to_string(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        format!("metrix:{:x}", hasher.finalize())
    }
}

/// A cached value with its lifetime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Cached value
    pub value: Value,
    /// Time to live in seconds
    pub ttl_secs: u64,
    /// When the entry was written
    pub created_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Entry created now
    pub fn new(value: Value, ttl: Duration) -> Self {
        Self {
            value,
            ttl_secs: ttl.as_secs(),
            created_at: Utc::now(),
        }
    }

    /// Whether the entry has outlived its TTL at `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(self.created_at);
        age.num_milliseconds() >= (self.ttl_secs as i64).saturating_mul(1000)
    }
}

/// Key-value storage behind the coordinator
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Fetch an entry
    async fn get(&self, key: &str) -> EngineResult<Option<CacheEntry>>;

    /// Store an entry
    async fn set(&self, key: &str, entry: CacheEntry) -> EngineResult<()>;

    /// Remove an entry
    async fn delete(&self, key: &str) -> EngineResult<()>;

    /// Remove every entry
    async fn flush(&self) -> EngineResult<()>;
}

/// Process-local cache backend
#[derive(Default)]
pub struct InMemoryCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl InMemoryCache {
    /// Empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries (expired ones included until read)
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    /// Whether nothing is stored
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> EngineResult<std::sync::MutexGuard<'_, HashMap<String, CacheEntry>>> {
        self.entries
            .lock()
            .map_err(|e| EngineError::Cache(format!("cache mutex poisoned: {e}")))
    }
}

#[async_trait]
impl CacheBackend for InMemoryCache {
    async fn get(&self, key: &str) -> EngineResult<Option<CacheEntry>> {
        Ok(self.lock()?.get(key).cloned())
    }

    async fn set(&self, key: &str, entry: CacheEntry) -> EngineResult<()> {
        self.lock()?.insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> EngineResult<()> {
        self.lock()?.remove(key);
        Ok(())
    }

    async fn flush(&self) -> EngineResult<()> {
        self.lock()?.clear();
        Ok(())
    }
}

/// Outcome a leader publishes to requests waiting on the same key
type Shared = Option<Result<Value, String>>;

/// Removes the in-flight registration when the leader finishes or is dropped
struct InFlightGuard<'a> {
    in_flight: &'a Mutex<HashMap<String, watch::Receiver<Shared>>>,
    key: String,
    tx: watch::Sender<Shared>,
}

impl InFlightGuard<'_> {
    fn publish(&self, outcome: Result<Value, String>) {
        self.tx.send_replace(Some(outcome));
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut in_flight) = self.in_flight.lock() {
            in_flight.remove(&self.key);
        }
    }
}

enum Role<'a> {
    Leader(InFlightGuard<'a>),
    Follower(watch::Receiver<Shared>),
}

/// Cache front: lookup, single-flight computation, invalidation
pub struct CacheCoordinator {
    backend: Arc<dyn CacheBackend>,
    default_ttl: Duration,
    in_flight: Mutex<HashMap<String, watch::Receiver<Shared>>>,
    keys_by_definition: Mutex<HashMap<String, BTreeSet<String>>>,
}

impl CacheCoordinator {
    /// Coordinator over `backend`
    pub fn new(backend: Arc<dyn CacheBackend>, default_ttl: Duration) -> Self {
        Self {
            backend,
            default_ttl,
            in_flight: Mutex::new(HashMap::new()),
            keys_by_definition: Mutex::new(HashMap::new()),
        }
    }

    /// Coordinator over a fresh [`InMemoryCache`]
    pub fn in_memory(default_ttl: Duration) -> Self {
        Self::new(Arc::new(InMemoryCache::new()), default_ttl)
    }

    /// TTL used when a caller passes none
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Cached value for `key`, deleting it if expired. Backend errors are a miss.
    async fn lookup(&self, key: &str) -> Option<Value> {
        match self.backend.get(key).await {
            Ok(Some(entry)) if entry.is_expired(Utc::now()) => {
                log::debug!("Cache entry {} expired; evicting", key);
                if let Err(e) = self.backend.delete(key).await {
                    log::warn!("Cache eviction failed for {}: {}", key, e);
                }
                self.forget_key(key);
                None
            }
            Ok(Some(entry)) => Some(entry.value),
            Ok(None) => None,
            Err(e) => {
                log::warn!("Cache read failed, treating as miss: {}", e);
                None
            }
        }
    }

    fn forget_key(&self, key: &str) {
        if let Ok(mut index) = self.keys_by_definition.lock() {
            index.retain(|_, keys| {
                keys.remove(key);
                !keys.is_empty()
            });
        }
    }

    async fn store(&self, inputs: &CacheKeyInputs, key: &str, value: Value, ttl: Duration) {
        if let Err(e) = self.backend.set(key, CacheEntry::new(value, ttl)).await {
            log::warn!("Cache write failed for {}: {}", key, e);
            return;
        }
        if let Ok(mut index) = self.keys_by_definition.lock() {
            index
                .entry(inputs.definition_hash.clone())
                .or_default()
                .insert(key.to_string());
        }
    }

    fn claim(&self, key: &str) -> Option<Role<'_>> {
        let mut in_flight = self.in_flight.lock().ok()?;
        if let Some(rx) = in_flight.get(key) {
            return Some(Role::Follower(rx.clone()));
        }
        let (tx, rx) = watch::channel(None);
        in_flight.insert(key.to_string(), rx);
        Some(Role::Leader(InFlightGuard {
            in_flight: &self.in_flight,
            key: key.to_string(),
            tx,
        }))
    }

    /// Return the cached value or compute, cache, and return it.
    ///
    /// The boolean is `true` when no computation ran for this call: a cache
    /// hit, or a value shared from a concurrent request for the same key.
    /// Failed computations are not cached.
    pub async fn get_or_compute<F, Fut>(
        &self,
        inputs: &CacheKeyInputs,
        ttl: Option<Duration>,
        compute: F,
    ) -> EngineResult<(Value, bool)>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = EngineResult<Value>>,
    {
        let key = inputs.key();
        let ttl = ttl.unwrap_or(self.default_ttl);

        let guard = loop {
            if let Some(value) = self.lookup(&key).await {
                log::debug!("Cache hit for {}", key);
                return Ok((value, true));
            }

            match self.claim(&key) {
                Some(Role::Leader(guard)) => break guard,
                Some(Role::Follower(mut rx)) => {
                    log::debug!("Awaiting in-flight computation for {}", key);
                    let shared = match rx.wait_for(Option::is_some).await {
                        Ok(outcome) => outcome.clone(),
                        Err(_) => None,
                    };
                    match shared {
                        Some(Ok(value)) => return Ok((value, true)),
                        Some(Err(message)) => {
                            return Err(EngineError::SharedComputation(message))
                        }
                        // Leader dropped without publishing; one waiter takes over
                        None => log::debug!("In-flight computation for {} abandoned", key),
                    }
                }
                None => {
                    log::warn!("Cache in-flight registry unavailable; computing {} directly", key);
                    return Ok((compute().await?, false));
                }
            }
        };

        // A leader for this key may have finished between the miss and the claim
        if let Some(value) = self.lookup(&key).await {
            guard.publish(Ok(value.clone()));
            return Ok((value, true));
        }

        match compute().await {
            Ok(value) => {
                self.store(inputs, &key, value.clone(), ttl).await;
                guard.publish(Ok(value.clone()));
                Ok((value, false))
            }
            Err(e) => {
                guard.publish(Err(e.to_string()));
                Err(e)
            }
        }
    }

    /// Drop the entry for one set of inputs
    pub async fn invalidate(&self, inputs: &CacheKeyInputs) {
        let key = inputs.key();
        if let Err(e) = self.backend.delete(&key).await {
            log::warn!("Cache invalidation failed for {}: {}", key, e);
        }
        if let Ok(mut index) = self.keys_by_definition.lock() {
            if let Some(keys) = index.get_mut(&inputs.definition_hash) {
                keys.remove(&key);
            }
        }
    }

    /// Drop every entry written for a metric definition
    pub async fn invalidate_metric(&self, definition_hash: &str) -> usize {
        let keys = self
            .keys_by_definition
            .lock()
            .ok()
            .and_then(|mut index| index.remove(definition_hash))
            .unwrap_or_default();
        for key in &keys {
            if let Err(e) = self.backend.delete(key).await {
                log::warn!("Cache invalidation failed for {}: {}", key, e);
            }
        }
        log::debug!("Invalidated {} cache entries for {}", keys.len(), definition_hash);
        keys.len()
    }

    /// Drop everything
    pub async fn flush(&self) {
        if let Err(e) = self.backend.flush().await {
            log::warn!("Cache flush failed: {}", e);
        }
        if let Ok(mut index) = self.keys_by_definition.lock() {
            index.clear();
        }
    }
}

#[cfg(test)]
#[path = "cache_test.rs"]
mod tests;
