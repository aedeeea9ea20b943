//! File Cache Port - 内容寻址文件缓存
//!
//! 将 (源文件, 操作参数) 映射为磁盘上的派生产物，具体实现在 infrastructure/adapters/storage

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::domain::cache::{ArtifactKey, CacheType};

/// File Cache 错误
#[derive(Debug, Error)]
pub enum FileCacheError {
    #[error("Source file not found: {0}")]
    SourceNotFound(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("IO error: {0}")]
    IoError(String),
}

impl From<std::io::Error> for FileCacheError {
    fn from(err: std::io::Error) -> Self {
        FileCacheError::IoError(err.to_string())
    }
}

/// 写入缓存的数据
///
/// 结构化数据写 JSON，二进制原样写入，其余写文本
#[derive(Debug, Clone)]
pub enum CachePayload {
    Json(serde_json::Value),
    Bytes(Vec<u8>),
    Text(String),
}

impl CachePayload {
    pub fn into_bytes(self) -> Result<Vec<u8>, FileCacheError> {
        match self {
            CachePayload::Json(value) => serde_json::to_vec(&value)
                .map_err(|e| FileCacheError::SerializationError(e.to_string())),
            CachePayload::Bytes(bytes) => Ok(bytes),
            CachePayload::Text(text) => Ok(text.into_bytes()),
        }
    }
}

/// 淘汰策略
#[derive(Debug, Clone, Default)]
pub struct EvictionPolicy {
    /// 超过该时长未访问的产物被删除
    pub max_age: Option<Duration>,
    /// 总大小上限（字节），超出后按最久未访问顺序删除
    pub max_bytes: Option<u64>,
}

/// 单个缓存根目录统计
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheRootStats {
    pub cache_type: String,
    pub entries: u64,
    pub total_bytes: u64,
}

/// 清理结果
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    pub expired_files: u64,
    pub evicted_files: u64,
    pub freed_bytes: u64,
    pub remaining_bytes: u64,
}

/// File Cache Port
///
/// 缓存路径：`<root>/<cache_type>_cache/<2hex>/<md5>.<ext>`
/// - md5 覆盖源文件路径、修改时间、缓存类型和参数
/// - 调用方只通过本接口读取缓存文件
pub trait FileCachePort: Send + Sync {
    /// 以 4096 字节块计算文件内容 md5，文件不存在返回 None
    fn file_hash(&self, path: &Path) -> Option<String>;

    /// 缓存类型根目录
    fn root_dir(&self, cache_type: &CacheType) -> PathBuf;

    /// 计算缓存路径，源文件不存在返回 None
    fn cache_path(
        &self,
        source: &Path,
        cache_type: &CacheType,
        artifact: &ArtifactKey,
    ) -> Option<PathBuf>;

    /// 仅当缓存文件已存在时返回其路径
    fn cached_file(
        &self,
        source: &Path,
        cache_type: &CacheType,
        artifact: &ArtifactKey,
    ) -> Option<PathBuf>;

    /// 读取缓存文件（同时刷新访问时间）
    fn read(&self, cached: &Path) -> Result<Vec<u8>, FileCacheError>;

    /// 写入缓存，返回缓存文件路径
    fn save(
        &self,
        source: &Path,
        cache_type: &CacheType,
        artifact: &ArtifactKey,
        payload: CachePayload,
    ) -> Result<PathBuf, FileCacheError>;

    /// 清空指定类型的缓存，None 表示清空全部内置类型；返回删除的文件数
    fn clear(&self, cache_type: Option<&CacheType>) -> Result<u64, FileCacheError>;

    /// 各缓存根目录统计
    fn stats(&self) -> Vec<CacheRootStats>;

    /// 按策略清理过期/超量产物
    fn sweep(&self, policy: &EvictionPolicy) -> Result<SweepReport, FileCacheError>;
}

/// 以 4096 字节块计算 md5
pub fn hash_file(path: &Path) -> Option<String> {
    use std::io::Read;

    let mut file = std::fs::File::open(path).ok()?;
    let mut context = md5::Context::new();
    let mut buf = [0u8; 4096];
    loop {
        match file.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => context.consume(&buf[..n]),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to hash file");
                return None;
            }
        }
    }
    Some(format!("{:x}", context.compute()))
}
