//! Sled-based TTL + LRU Key-Value Cache Implementation

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sled::Db;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::application::ports::{KeyValueCachePort, KvCacheError, KvCacheStats};

const ENTRY_PREFIX: &str = "kv:";

/// Sled 缓存配置
#[derive(Debug, Clone)]
pub struct SledCacheConfig {
    /// 数据库路径
    pub db_path: String,
    /// 最大缓存大小（字节）
    pub max_size_bytes: u64,
}

impl Default for SledCacheConfig {
    fn default() -> Self {
        Self {
            db_path: "data/cache/kv.sled".to_string(),
            max_size_bytes: 512 * 1024 * 1024, // 512MB
        }
    }
}

/// 内部缓存条目
#[derive(Debug, Clone, Serialize, Deserialize)]
struct InternalCacheEntry {
    value: Vec<u8>,
    size_bytes: u64,
    /// 过期时间（毫秒时间戳）
    expires_at: i64,
    last_accessed: i64,
    created_at: i64,
}

impl InternalCacheEntry {
    fn is_expired(&self, now: i64) -> bool {
        self.expires_at <= now
    }
}

/// Sled KV 缓存
pub struct SledKvCache {
    db: Db,
    max_size_bytes: u64,
    current_size: AtomicU64,
    hit_count: AtomicU64,
    miss_count: AtomicU64,
}

impl SledKvCache {
    /// 创建新的缓存实例
    pub fn new(config: &SledCacheConfig) -> Result<Self, KvCacheError> {
        let db = sled::open(&config.db_path)
            .map_err(|e| KvCacheError::DatabaseError(e.to_string()))?;
        let cache = Self::from_db(db, config.max_size_bytes)?;

        tracing::info!(
            db_path = %config.db_path,
            max_size_bytes = config.max_size_bytes,
            current_size = cache.current_size.load(Ordering::Relaxed),
            "SledKvCache initialized"
        );
        Ok(cache)
    }

    /// 打开现有缓存
    pub fn open<P: AsRef<Path>>(path: P, max_size_bytes: u64) -> Result<Self, KvCacheError> {
        let config = SledCacheConfig {
            db_path: path.as_ref().to_string_lossy().to_string(),
            max_size_bytes,
        };
        Self::new(&config)
    }

    fn from_db(db: Db, max_size_bytes: u64) -> Result<Self, KvCacheError> {
        let current_size = Self::calculate_total_size(&db)?;
        Ok(Self {
            db,
            max_size_bytes,
            current_size: AtomicU64::new(current_size),
            hit_count: AtomicU64::new(0),
            miss_count: AtomicU64::new(0),
        })
    }

    fn entry_key(key: &str) -> String {
        format!("{}{}", ENTRY_PREFIX, key)
    }

    fn decode(bytes: &[u8]) -> Result<InternalCacheEntry, KvCacheError> {
        bincode::deserialize(bytes).map_err(|e| KvCacheError::SerializationError(e.to_string()))
    }

    fn encode(entry: &InternalCacheEntry) -> Result<Vec<u8>, KvCacheError> {
        bincode::serialize(entry).map_err(|e| KvCacheError::SerializationError(e.to_string()))
    }

    /// 计算数据库中所有条目的总大小
    fn calculate_total_size(db: &Db) -> Result<u64, KvCacheError> {
        let mut total = 0u64;
        for item in db.scan_prefix(ENTRY_PREFIX) {
            let (_, value) = item.map_err(|e| KvCacheError::DatabaseError(e.to_string()))?;
            if let Ok(entry) = Self::decode(&value) {
                total += entry.size_bytes;
            }
        }
        Ok(total)
    }

    /// 删除 key，同步更新大小统计
    fn remove_raw(&self, raw_key: &[u8]) -> Result<(), KvCacheError> {
        if let Some(old) = self
            .db
            .remove(raw_key)
            .map_err(|e| KvCacheError::DatabaseError(e.to_string()))?
        {
            if let Ok(entry) = Self::decode(&old) {
                self.current_size.fetch_sub(entry.size_bytes, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    /// 仅当当前值仍为 `expected` 时删除，返回是否删除
    fn remove_if_unchanged(
        &self,
        raw_key: &[u8],
        expected: &[u8],
        size_bytes: u64,
    ) -> Result<bool, KvCacheError> {
        let swapped = self
            .db
            .compare_and_swap(raw_key, Some(expected), None::<sled::IVec>)
            .map_err(|e| KvCacheError::DatabaseError(e.to_string()))?;
        if swapped.is_ok() {
            self.current_size.fetch_sub(size_bytes, Ordering::Relaxed);
        }
        Ok(swapped.is_ok())
    }

    /// LRU 淘汰，返回是否删除了条目
    fn evict_lru(&self) -> Result<bool, KvCacheError> {
        let mut oldest: Option<(sled::IVec, i64)> = None;

        for item in self.db.scan_prefix(ENTRY_PREFIX) {
            let (key, value) = item.map_err(|e| KvCacheError::DatabaseError(e.to_string()))?;
            if let Ok(entry) = Self::decode(&value) {
                let is_older = oldest
                    .as_ref()
                    .map(|(_, accessed)| entry.last_accessed < *accessed)
                    .unwrap_or(true);
                if is_older {
                    oldest = Some((key, entry.last_accessed));
                }
            }
        }

        match oldest {
            Some((key, _)) => {
                self.remove_raw(&key)?;
                tracing::debug!(key = %String::from_utf8_lossy(&key), "LRU evicted cache entry");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// 删除所有过期条目，返回删除数量
    pub fn purge_expired_entries(&self) -> Result<u64, KvCacheError> {
        let now = Utc::now().timestamp_millis();
        let mut expired = Vec::new();
        for item in self.db.scan_prefix(ENTRY_PREFIX) {
            let (key, value) = item.map_err(|e| KvCacheError::DatabaseError(e.to_string()))?;
            match Self::decode(&value) {
                Ok(entry) if !entry.is_expired(now) => {}
                _ => expired.push(key),
            }
        }

        for key in &expired {
            self.remove_raw(key)?;
        }
        if !expired.is_empty() {
            tracing::debug!(count = expired.len(), "Expired KV entries purged");
        }
        Ok(expired.len() as u64)
    }

    /// 刷新数据库
    pub fn flush(&self) -> Result<(), KvCacheError> {
        self.db
            .flush()
            .map_err(|e| KvCacheError::DatabaseError(e.to_string()))?;
        Ok(())
    }
}

impl KeyValueCachePort for SledKvCache {
    fn purge_expired(&self) -> Result<u64, KvCacheError> {
        self.purge_expired_entries()
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KvCacheError> {
        let db_key = Self::entry_key(key);
        let now = Utc::now().timestamp_millis();

        let data = self
            .db
            .get(&db_key)
            .map_err(|e| KvCacheError::DatabaseError(e.to_string()))?;

        let Some(data) = data else {
            self.miss_count.fetch_add(1, Ordering::Relaxed);
            return Ok(None);
        };

        let mut entry = Self::decode(&data)?;
        if entry.is_expired(now) {
            self.remove_if_unchanged(db_key.as_bytes(), &data, entry.size_bytes)?;
            self.miss_count.fetch_add(1, Ordering::Relaxed);
            return Ok(None);
        }

        // 更新 last_accessed (LRU touch)；条目已被并发删除或覆盖时放弃
        entry.last_accessed = now;
        let touched = self
            .db
            .compare_and_swap(&db_key, Some(&data[..]), Some(Self::encode(&entry)?))
            .map_err(|e| KvCacheError::DatabaseError(e.to_string()))?;
        if touched.is_err() {
            tracing::trace!(key = %key, "Entry changed during LRU touch");
        }

        self.hit_count.fetch_add(1, Ordering::Relaxed);
        Ok(Some(entry.value))
    }

    fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), KvCacheError> {
        let size = value.len() as u64;
        if size > self.max_size_bytes {
            tracing::debug!(key = %key, size_bytes = size, "Value larger than cache, not stored");
            return Ok(());
        }

        let db_key = Self::entry_key(key);
        self.remove_raw(db_key.as_bytes())?;

        // 淘汰以腾出空间
        while self.current_size.load(Ordering::Relaxed) + size > self.max_size_bytes {
            if !self.evict_lru()? {
                break;
            }
        }

        let now = Utc::now().timestamp_millis();
        let entry = InternalCacheEntry {
            value,
            size_bytes: size,
            expires_at: now.saturating_add(ttl.as_millis() as i64),
            last_accessed: now,
            created_at: now,
        };

        self.db
            .insert(&db_key, Self::encode(&entry)?)
            .map_err(|e| KvCacheError::DatabaseError(e.to_string()))?;
        self.current_size.fetch_add(size, Ordering::Relaxed);

        tracing::debug!(key = %key, size_bytes = size, ttl_secs = ttl.as_secs(), "Value cached");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), KvCacheError> {
        self.remove_raw(Self::entry_key(key).as_bytes())
    }

    fn clear(&self) -> Result<(), KvCacheError> {
        self.db
            .clear()
            .map_err(|e| KvCacheError::DatabaseError(e.to_string()))?;
        self.current_size.store(0, Ordering::Relaxed);
        tracing::info!("KV cache cleared");
        Ok(())
    }

    fn stats(&self) -> KvCacheStats {
        KvCacheStats {
            total_entries: self.db.scan_prefix(ENTRY_PREFIX).count(),
            total_size_bytes: self.current_size.load(Ordering::Relaxed),
            max_size_bytes: self.max_size_bytes,
            hit_count: self.hit_count.load(Ordering::Relaxed),
            miss_count: self.miss_count.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open_cache(dir: &tempfile::TempDir, max_size_bytes: u64) -> SledKvCache {
        let config = SledCacheConfig {
            db_path: dir.path().join("test.sled").to_string_lossy().to_string(),
            max_size_bytes,
        };
        SledKvCache::new(&config).unwrap()
    }

    #[test]
    fn test_put_get() {
        let dir = tempdir().unwrap();
        let cache = open_cache(&dir, 1024 * 1024);

        cache
            .put("pdf_abc_1_text", b"hello".to_vec(), Duration::from_secs(60))
            .unwrap();
        assert_eq!(cache.get("pdf_abc_1_text").unwrap(), Some(b"hello".to_vec()));
        assert_eq!(cache.get("missing").unwrap(), None);

        let stats = cache.stats();
        assert_eq!(stats.total_entries, 1);
        assert_eq!(stats.total_size_bytes, 5);
        assert_eq!(stats.hit_count, 1);
        assert_eq!(stats.miss_count, 1);
    }

    #[test]
    fn test_ttl_expiry() {
        let dir = tempdir().unwrap();
        let cache = open_cache(&dir, 1024 * 1024);

        cache.put("short", vec![1, 2, 3], Duration::from_millis(0)).unwrap();
        assert_eq!(cache.get("short").unwrap(), None);
        assert_eq!(cache.stats().total_size_bytes, 0);
    }

    #[test]
    fn test_overwrite_keeps_size_accounting() {
        let dir = tempdir().unwrap();
        let cache = open_cache(&dir, 1024);

        cache.put("k", vec![0; 100], Duration::from_secs(60)).unwrap();
        cache.put("k", vec![0; 40], Duration::from_secs(60)).unwrap();
        assert_eq!(cache.stats().total_size_bytes, 40);
        assert_eq!(cache.stats().total_entries, 1);
    }

    #[test]
    fn test_lru_eviction() {
        let dir = tempdir().unwrap();
        let cache = open_cache(&dir, 100);

        cache.put("a", vec![0; 40], Duration::from_secs(60)).unwrap();
        std::thread::sleep(Duration::from_millis(5));
        cache.put("b", vec![0; 40], Duration::from_secs(60)).unwrap();
        std::thread::sleep(Duration::from_millis(5));
        cache.get("a").unwrap();
        cache.put("c", vec![0; 40], Duration::from_secs(60)).unwrap();

        assert!(cache.get("a").unwrap().is_some());
        assert!(cache.get("b").unwrap().is_none());
        assert!(cache.get("c").unwrap().is_some());
    }

    #[test]
    fn test_purge_and_clear() {
        let dir = tempdir().unwrap();
        let cache = open_cache(&dir, 1024);

        cache.put("old", vec![1], Duration::from_millis(0)).unwrap();
        cache.put("new", vec![2], Duration::from_secs(60)).unwrap();
        assert_eq!(cache.purge_expired().unwrap(), 1);
        assert_eq!(cache.stats().total_entries, 1);

        cache.clear().unwrap();
        assert_eq!(cache.stats().total_entries, 0);
        assert_eq!(cache.stats().total_size_bytes, 0);
    }

    #[test]
    fn test_concurrent_reads_do_not_resurrect_removed_entries() {
        let dir = tempdir().unwrap();
        let cache = std::sync::Arc::new(open_cache(&dir, 1024 * 1024));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        cache.get("k").unwrap();
                    }
                })
            })
            .collect();

        for _ in 0..500 {
            cache.put("k", vec![7; 100], Duration::from_secs(60)).unwrap();
            cache.remove("k").unwrap();
        }
        for reader in readers {
            reader.join().unwrap();
        }

        assert_eq!(cache.get("k").unwrap(), None);
        let stats = cache.stats();
        assert_eq!(stats.total_entries, 0);
        assert_eq!(stats.total_size_bytes, 0);
        assert_eq!(
            SledKvCache::calculate_total_size(&cache.db).unwrap(),
            stats.total_size_bytes
        );
    }
}
