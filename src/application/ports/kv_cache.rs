//! Key-Value Cache Port - 带 TTL 的进程级缓存
//!
//! 用于页面文本、音频信息、音频分块，与文件缓存相互独立

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// KV Cache 错误
#[derive(Debug, Error)]
pub enum KvCacheError {
    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

/// 缓存统计信息
#[derive(Debug, Clone, Default, Serialize)]
pub struct KvCacheStats {
    pub total_entries: usize,
    pub total_size_bytes: u64,
    pub max_size_bytes: u64,
    pub hit_count: u64,
    pub miss_count: u64,
}

/// Key-Value Cache Port
pub trait KeyValueCachePort: Send + Sync {
    /// 获取未过期的值
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KvCacheError>;

    /// 写入值，超过 ttl 后视为不存在
    fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), KvCacheError>;

    fn remove(&self, key: &str) -> Result<(), KvCacheError>;

    fn clear(&self) -> Result<(), KvCacheError>;

    /// 删除已过期条目，返回删除数量
    fn purge_expired(&self) -> Result<u64, KvCacheError> {
        Ok(0)
    }

    fn stats(&self) -> KvCacheStats;
}

/// 读取 JSON 值，出错时记录日志并按未命中处理
pub fn get_json<T: DeserializeOwned>(cache: &dyn KeyValueCachePort, key: &str) -> Option<T> {
    match cache.get(key) {
        Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Discarding undecodable cache value");
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "KV cache read failed");
            None
        }
    }
}

/// 写入 JSON 值，失败只记录日志
pub fn put_json<T: Serialize>(cache: &dyn KeyValueCachePort, key: &str, value: &T, ttl: Duration) {
    let bytes = match serde_json::to_vec(value) {
        Ok(b) => b,
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "Failed to encode cache value");
            return;
        }
    };
    if let Err(e) = cache.put(key, bytes, ttl) {
        tracing::warn!(key = %key, error = %e, "KV cache write failed");
    }
}
