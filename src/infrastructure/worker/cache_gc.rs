//! Cache GC - 周期性清理文件缓存与过期 KV 条目

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::application::ports::{EvictionPolicy, FileCachePort, KeyValueCachePort};

#[derive(Debug, Clone)]
pub struct CacheGcConfig {
    /// 清理间隔
    pub interval: Duration,
    pub policy: EvictionPolicy,
}

impl Default for CacheGcConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3600),
            policy: EvictionPolicy::default(),
        }
    }
}

/// 执行一次清理
pub fn run_cache_gc(
    file_cache: &dyn FileCachePort,
    kv_cache: &dyn KeyValueCachePort,
    policy: &EvictionPolicy,
) {
    match file_cache.sweep(policy) {
        Ok(report) => tracing::info!(
            expired_files = report.expired_files,
            evicted_files = report.evicted_files,
            freed_bytes = report.freed_bytes,
            remaining_bytes = report.remaining_bytes,
            "File cache sweep finished"
        ),
        Err(e) => tracing::error!(error = %e, "File cache sweep failed"),
    }

    match kv_cache.purge_expired() {
        Ok(purged) => tracing::debug!(purged = purged, "KV cache purge finished"),
        Err(e) => tracing::error!(error = %e, "KV cache purge failed"),
    }
}

/// 启动后台清理任务
///
/// 第一次清理在一个间隔之后执行
pub fn spawn_cache_gc(
    file_cache: Arc<dyn FileCachePort>,
    kv_cache: Arc<dyn KeyValueCachePort>,
    config: CacheGcConfig,
) -> JoinHandle<()> {
    tracing::info!(
        interval_secs = config.interval.as_secs(),
        max_age_secs = config.policy.max_age.map(|d| d.as_secs()),
        max_bytes = config.policy.max_bytes,
        "Cache GC started"
    );

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(config.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let file_cache = file_cache.clone();
            let kv_cache = kv_cache.clone();
            let policy = config.policy.clone();
            let result = tokio::task::spawn_blocking(move || {
                run_cache_gc(file_cache.as_ref(), kv_cache.as_ref(), &policy)
            })
            .await;

            if let Err(e) = result {
                tracing::error!(error = %e, "Cache GC task panicked");
            }
        }
    })
}
