//! PDF Context - Errors

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PdfError {
    #[error("页码超出范围: {page} (共 {total} 页)")]
    PageOutOfRange { page: u32, total: usize },

    #[error("无效的 DPI: {0}")]
    InvalidDpi(u32),

    #[error("无效的图片质量: {0}")]
    InvalidQuality(u32),

    #[error("不支持的图片格式: {0}")]
    UnsupportedFormat(String),
}
