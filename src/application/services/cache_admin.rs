//! Cache Admin Service - 缓存统计与清理

use serde::Serialize;
use std::sync::Arc;

use crate::application::error::ApplicationError;
use crate::application::ports::{
    CacheRootStats, EvictionPolicy, FileCachePort, KeyValueCachePort, KvCacheStats, SweepReport,
};
use crate::domain::cache::CacheType;

/// 缓存统计
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub roots: Vec<CacheRootStats>,
    pub total_entries: u64,
    pub total_bytes: u64,
    pub kv: KvCacheStats,
}

/// 清理结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClearReport {
    pub cache_type: String,
    pub removed_files: u64,
    pub kv_cleared: bool,
}

pub struct CacheAdminService {
    file_cache: Arc<dyn FileCachePort>,
    kv_cache: Arc<dyn KeyValueCachePort>,
}

impl CacheAdminService {
    pub fn new(file_cache: Arc<dyn FileCachePort>, kv_cache: Arc<dyn KeyValueCachePort>) -> Self {
        Self {
            file_cache,
            kv_cache,
        }
    }

    pub fn stats(&self) -> CacheStats {
        let roots = self.file_cache.stats();
        CacheStats {
            total_entries: roots.iter().map(|r| r.entries).sum(),
            total_bytes: roots.iter().map(|r| r.total_bytes).sum(),
            roots,
            kv: self.kv_cache.stats(),
        }
    }

    /// 清空缓存
    ///
    /// 指定类型时只清该类型的文件缓存；不指定时同时清空 KV 缓存
    pub fn clear(&self, cache_type: Option<&str>) -> Result<ClearReport, ApplicationError> {
        let parsed = cache_type.map(CacheType::parse).transpose()?;
        let removed_files = self.file_cache.clear(parsed.as_ref())?;

        let kv_cleared = parsed.is_none();
        if kv_cleared {
            self.kv_cache
                .clear()
                .map_err(|e| ApplicationError::StorageError(e.to_string()))?;
        }

        Ok(ClearReport {
            cache_type: parsed
                .map(|t| t.as_str().to_string())
                .unwrap_or_else(|| "all".to_string()),
            removed_files,
            kv_cleared,
        })
    }

    /// 按策略清理文件缓存并删除过期 KV 条目
    pub fn sweep(&self, policy: &EvictionPolicy) -> Result<SweepReport, ApplicationError> {
        let report = self.file_cache.sweep(policy)?;
        if let Err(e) = self.kv_cache.purge_expired() {
            tracing::warn!(error = %e, "KV cache purge failed");
        }
        Ok(report)
    }
}
