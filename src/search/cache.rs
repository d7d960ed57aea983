//! Response cache - sharded TTL store for assembled responses / 响应缓存
//!
//! Serialized responses are spread over lock shards keyed by the request
//! key. Entries age out after the life window, expired entries are purged
//! on a clean interval during writes, and a hard byte cap evicts oldest
//! first. / 序列化响应按请求键分片存放，条目按生命周期过期，写入时按清理
//! 间隔清扫，字节硬上限按最旧优先淘汰。
//!
//! - zero life window disables expiry / 生命周期为零则不过期
//! - zero hard cap disables eviction / 硬上限为零则不淘汰
//! - zero-hit responses are never stored / 零命中响应不入缓存

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::config::CacheConfig;
use crate::error::SearchError;

use super::request::RequestKey;
use super::response::SearchResponse;

struct CacheEntry {
    payload: Bytes,
    stored_at: Instant,
}

/// Sharded byte store with TTL and a hard byte cap / 带 TTL 与字节硬上限的分片存储
pub struct CacheShards {
    shards: Vec<RwLock<HashMap<u64, CacheEntry>>>,
    life_window: Duration,
    clean_window: Duration,
    max_entry_bytes: usize,
    hard_max_bytes: usize,
    used_bytes: AtomicUsize,
    last_clean: Mutex<Instant>,
    hits: AtomicU64,
    misses: AtomicU64,
    stores: AtomicU64,
    evictions: AtomicU64,
}

/// Point-in-time cache counters / 缓存计数快照
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub used_bytes: usize,
    pub hits: u64,
    pub misses: u64,
    pub stores: u64,
    pub evictions: u64,
    pub captured_at: i64,
}

impl CacheShards {
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_windows(
            config.shards,
            config.life_window(),
            config.clean_window(),
            config.max_entry_bytes(),
            config.hard_max_bytes(),
        )
    }

    fn with_windows(
        shards: usize,
        life_window: Duration,
        clean_window: Duration,
        max_entry_bytes: usize,
        hard_max_bytes: usize,
    ) -> Self {
        let count = shards.max(1);
        Self {
            shards: (0..count).map(|_| RwLock::new(HashMap::new())).collect(),
            life_window,
            clean_window,
            max_entry_bytes,
            hard_max_bytes,
            used_bytes: AtomicUsize::new(0),
            last_clean: Mutex::new(Instant::now()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            stores: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    fn shard(&self, key: u64) -> &RwLock<HashMap<u64, CacheEntry>> {
        &self.shards[(key as usize) % self.shards.len()]
    }

    fn expired(&self, entry: &CacheEntry) -> bool {
        self.life_window > Duration::ZERO && entry.stored_at.elapsed() >= self.life_window
    }

    pub fn get(&self, key: RequestKey) -> Option<Bytes> {
        let shard = self.shard(key.value());
        {
            let guard = shard.read();
            match guard.get(&key.value()) {
                Some(entry) if !self.expired(entry) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Some(entry.payload.clone());
                }
                Some(_) => {} // 已过期，下面移除
                None => {
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    return None;
                }
            }
        }
        let mut guard = shard.write();
        if let Some(entry) = guard.remove(&key.value()) {
            self.used_bytes.fetch_sub(entry.payload.len(), Ordering::Relaxed);
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    pub fn put(&self, key: RequestKey, payload: Bytes) {
        if payload.len() > self.max_entry_bytes {
            debug!(key = %key, size = payload.len(), "cache entry exceeds size cap, skipping");
            return;
        }
        self.maybe_clean();

        let size = payload.len();
        {
            let mut guard = self.shard(key.value()).write();
            if let Some(previous) = guard.insert(
                key.value(),
                CacheEntry {
                    payload,
                    stored_at: Instant::now(),
                },
            ) {
                self.used_bytes.fetch_sub(previous.payload.len(), Ordering::Relaxed);
            }
        }
        self.used_bytes.fetch_add(size, Ordering::Relaxed);
        self.stores.fetch_add(1, Ordering::Relaxed);

        if self.hard_max_bytes > 0 && self.used_bytes.load(Ordering::Relaxed) > self.hard_max_bytes {
            self.evict_to_cap();
        }
    }

    pub fn remove(&self, key: RequestKey) {
        let mut guard = self.shard(key.value()).write();
        if let Some(entry) = guard.remove(&key.value()) {
            self.used_bytes.fetch_sub(entry.payload.len(), Ordering::Relaxed);
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn maybe_clean(&self) {
        if self.clean_window.is_zero() {
            return;
        }
        {
            let mut last = self.last_clean.lock();
            if last.elapsed() < self.clean_window {
                return;
            }
            *last = Instant::now();
        }
        self.purge_expired();
    }

    fn purge_expired(&self) {
        for shard in &self.shards {
            let mut guard = shard.write();
            let mut freed = 0usize;
            let mut evicted = 0u64;
            guard.retain(|_, entry| {
                if self.expired(entry) {
                    freed += entry.payload.len();
                    evicted += 1;
                    false
                } else {
                    true
                }
            });
            if freed > 0 {
                self.used_bytes.fetch_sub(freed, Ordering::Relaxed);
            }
            if evicted > 0 {
                self.evictions.fetch_add(evicted, Ordering::Relaxed);
            }
        }
    }

    fn evict_to_cap(&self) {
        self.purge_expired();
        while self.used_bytes.load(Ordering::Relaxed) > self.hard_max_bytes {
            if !self.evict_oldest() {
                break;
            }
        }
    }

    fn evict_oldest(&self) -> bool {
        let mut oldest: Option<(usize, u64, Instant)> = None;
        for (index, shard) in self.shards.iter().enumerate() {
            let guard = shard.read();
            for (key, entry) in guard.iter() {
                let is_older = match oldest {
                    Some((_, _, stored_at)) => entry.stored_at < stored_at,
                    None => true,
                };
                if is_older {
                    oldest = Some((index, *key, entry.stored_at));
                }
            }
        }
        let (index, key, _) = match oldest {
            Some(found) => found,
            None => return false,
        };
        let mut guard = self.shards[index].write();
        match guard.remove(&key) {
            Some(entry) => {
                self.used_bytes.fetch_sub(entry.payload.len(), Ordering::Relaxed);
                self.evictions.fetch_add(1, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.read().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            used_bytes: self.used_bytes.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            stores: self.stores.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            captured_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// Lazily built response cache, reset swaps in a fresh store / 惰性构建的响应缓存
pub struct ResponseCache {
    store: tokio::sync::RwLock<Option<Arc<CacheShards>>>,
    config: CacheConfig,
}

impl ResponseCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            store: tokio::sync::RwLock::new(None),
            config,
        }
    }

    /// Current store, built on first use / 当前存储，首次使用时构建
    async fn get_store(&self) -> Arc<CacheShards> {
        {
            let guard = self.store.read().await;
            if let Some(store) = guard.as_ref() {
                return store.clone();
            }
        }
        let mut guard = self.store.write().await;
        if let Some(store) = guard.as_ref() {
            return store.clone();
        }
        let store = Arc::new(CacheShards::new(&self.config));
        *guard = Some(store.clone());
        store
    }

    /// Drop every entry by swapping in a fresh store / 换入新存储以清空全部条目
    pub async fn reset(&self) {
        let mut guard = self.store.write().await;
        *guard = Some(Arc::new(CacheShards::new(&self.config)));
    }

    pub async fn get_response(&self, key: RequestKey) -> Option<SearchResponse> {
        let store = self.get_store().await;
        let payload = store.get(key)?;
        match serde_json::from_slice(&payload) {
            Ok(response) => Some(response),
            Err(e) => {
                let err = SearchError::CacheDecode(e);
                warn!(key = %key, error = %err, "dropping undecodable cache entry");
                store.remove(key);
                None
            }
        }
    }

    pub async fn store_response(&self, key: RequestKey, response: &SearchResponse) {
        if response.total_hits == 0 {
            debug!(key = %key, "zero-hit response not cached");
            return;
        }
        let payload = match serde_json::to_vec(response) {
            Ok(bytes) => Bytes::from(bytes),
            Err(e) => {
                warn!(key = %key, error = %e, "unable to serialize response for cache");
                return;
            }
        };
        let store = self.get_store().await;
        store.put(key, payload);
        debug!(key = %key, "set cache for key");
    }

    pub async fn stats(&self) -> CacheStats {
        self.get_store().await.stats()
    }
}
