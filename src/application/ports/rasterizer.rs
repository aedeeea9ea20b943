//! Rasterizer Port - 外部 PDF 光栅化进程

use std::path::Path;
use thiserror::Error;

use crate::domain::pdf::RenderOptions;

#[derive(Debug, Error)]
pub enum RasterizeError {
    #[error("Rasterizer binary not found: {0}")]
    BinaryNotFound(String),

    #[error("Rasterizer process failed: {0}")]
    ProcessFailed(String),

    #[error("Rasterizer produced no output")]
    EmptyOutput,

    #[error("IO error: {0}")]
    IoError(String),
}

/// Rasterizer Port
pub trait RasterizerPort: Send + Sync {
    /// 渲染单页（1 起始页码），返回编码后的图片字节
    fn rasterize(
        &self,
        path: &Path,
        page_number: u32,
        options: &RenderOptions,
    ) -> Result<Vec<u8>, RasterizeError>;

    /// 光栅化程序是否可用
    fn is_available(&self) -> bool;
}
