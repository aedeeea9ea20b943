//! PDF Reader Port - 页数、元数据、文本与书签读取

use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

use crate::domain::pdf::RawOutlineItem;

#[derive(Debug, Error)]
pub enum PdfReaderError {
    #[error("PDF reader unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to load PDF: {0}")]
    LoadError(String),

    #[error("Page {0} not found")]
    PageNotFound(usize),

    #[error("Failed to extract text: {0}")]
    TextError(String),
}

/// 文档概要
#[derive(Debug, Clone, Default)]
pub struct PdfDocumentSummary {
    pub total_pages: usize,
    pub metadata: BTreeMap<String, String>,
}

/// PDF Reader Port
///
/// 页码参数均为 0 起始索引
pub trait PdfReaderPort: Send + Sync {
    fn summary(&self, path: &Path) -> Result<PdfDocumentSummary, PdfReaderError>;

    fn page_text(&self, path: &Path, page_index: usize) -> Result<String, PdfReaderError>;

    fn outline(&self, path: &Path) -> Result<Vec<RawOutlineItem>, PdfReaderError>;
}
