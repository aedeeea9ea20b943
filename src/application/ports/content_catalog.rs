//! Content Catalog Port - 内容记录解析
//!
//! 由内容 slug 定位 PDF / 音频源文件

use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Content not found: {0}")]
    NotFound(String),

    #[error("Invalid content slug: {0}")]
    InvalidSlug(String),

    #[error("IO error: {0}")]
    IoError(String),
}

/// 内容记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRecord {
    pub slug: String,
    pub pdf_path: Option<PathBuf>,
    pub audio_path: Option<PathBuf>,
}

#[async_trait]
pub trait ContentCatalogPort: Send + Sync {
    async fn resolve(&self, slug: &str) -> Result<ContentRecord, CatalogError>;
}
