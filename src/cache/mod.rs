//! String-keyed cache shared by the facet query path and the translator.
//!
//! Values are stored as JSON text so one backend serves every payload type.

use dashmap::DashMap;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

const DEFAULT_MAX_ENTRIES: usize = 1000;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Cache backend unavailable: {0}")]
    Unavailable(String),
}

#[async_trait::async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    /// `ttl: None` keeps the entry until it is deleted or evicted.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError>;
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}

#[derive(Debug, Clone)]
struct Slot {
    payload: String,
    deadline: Option<Instant>,
}

impl Slot {
    fn live_at(&self, now: Instant) -> bool {
        self.deadline.map_or(true, |d| now <= d)
    }
}

/// Process-local backend with a soft entry limit.
///
/// Stale slots are removed when read. Inserting a new key into a full cache first
/// sweeps stale slots, then evicts the slot with the nearest deadline.
#[derive(Debug, Clone)]
pub struct InMemoryCache {
    slots: Arc<DashMap<String, Slot>>,
    max_entries: usize,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::bounded(DEFAULT_MAX_ENTRIES)
    }

    pub fn bounded(max_entries: usize) -> Self {
        Self {
            slots: Arc::new(DashMap::new()),
            max_entries: max_entries.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn make_room(&self) {
        let now = Instant::now();
        self.slots.retain(|_, slot| slot.live_at(now));
        if self.slots.len() < self.max_entries {
            return;
        }
        // Slots without a deadline go last.
        let victim = self
            .slots
            .iter()
            .min_by_key(|e| (e.value().deadline.is_none(), e.value().deadline))
            .map(|e| e.key().clone());
        if let Some(key) = victim {
            self.slots.remove(&key);
        }
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl CacheBackend for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        let hit = self
            .slots
            .get(key)
            .map(|slot| slot.live_at(now).then(|| slot.payload.clone()));
        match hit {
            Some(Some(payload)) => Ok(Some(payload)),
            Some(None) => {
                self.slots.remove_if(key, |_, slot| !slot.live_at(now));
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
        if !self.slots.contains_key(key) && self.slots.len() >= self.max_entries {
            self.make_room();
        }
        self.slots.insert(
            key.to_string(),
            Slot {
                payload: value.to_string(),
                deadline: ttl.map(|d| Instant::now() + d),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.slots.remove(key);
        Ok(())
    }
}

/// Reads a JSON-encoded value. Undecodable entries count as misses and are dropped.
pub async fn get_json<T: DeserializeOwned>(
    cache: &dyn CacheBackend,
    key: &str,
) -> Result<Option<T>, CacheError> {
    let Some(raw) = cache.get(key).await? else {
        return Ok(None);
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            tracing::warn!(key, error = %e, "Discarding undecodable cache entry");
            cache.delete(key).await?;
            Ok(None)
        }
    }
}

pub async fn set_json<T: Serialize + Sync>(
    cache: &dyn CacheBackend,
    key: &str,
    value: &T,
    ttl: Option<Duration>,
) -> Result<(), CacheError> {
    let raw = serde_json::to_string(value)?;
    cache.set(key, &raw, ttl).await
}

/// Facet payloads vary by scope, language and the applied-filter fingerprint.
pub fn facet_cache_key(scope: &str, lang: &str, fingerprint: &str) -> String {
    format!("facets:{scope}:{lang}:{fingerprint}")
}
