//! Pdfium Reader - 基于 pdfium-render 的 PDF 读取
//!
//! 实现 PdfReaderPort。每次调用时绑定 pdfium 动态库，库不可用时返回
//! `PdfReaderError::Unavailable`

use parking_lot::Mutex;
use pdfium_render::prelude::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::application::ports::{PdfDocumentSummary, PdfReaderError, PdfReaderPort};
use crate::domain::pdf::RawOutlineItem;

/// 书签最大嵌套深度
const MAX_OUTLINE_DEPTH: usize = 32;

const METADATA_TAGS: &[(&str, PdfDocumentMetadataTagType)] = &[
    ("Title", PdfDocumentMetadataTagType::Title),
    ("Author", PdfDocumentMetadataTagType::Author),
    ("Subject", PdfDocumentMetadataTagType::Subject),
    ("Keywords", PdfDocumentMetadataTagType::Keywords),
    ("Creator", PdfDocumentMetadataTagType::Creator),
    ("Producer", PdfDocumentMetadataTagType::Producer),
    ("CreationDate", PdfDocumentMetadataTagType::CreationDate),
    ("ModDate", PdfDocumentMetadataTagType::ModificationDate),
];

/// Pdfium 读取器配置
#[derive(Debug, Clone)]
pub struct PdfiumReaderConfig {
    /// pdfium 动态库搜索目录，均失败时尝试系统库
    pub library_dirs: Vec<PathBuf>,
}

impl Default for PdfiumReaderConfig {
    fn default() -> Self {
        Self {
            library_dirs: vec![
                PathBuf::from("./"),
                PathBuf::from("/usr/lib"),
                PathBuf::from("/usr/local/lib"),
            ],
        }
    }
}

pub struct PdfiumReader {
    library_dirs: Vec<String>,
    /// pdfium 调用串行化
    lock: Mutex<()>,
}

impl PdfiumReader {
    pub fn new(config: PdfiumReaderConfig) -> Self {
        Self {
            library_dirs: config
                .library_dirs
                .iter()
                .map(|d| d.to_string_lossy().to_string())
                .collect(),
            lock: Mutex::new(()),
        }
    }

    fn bind(&self) -> Result<Pdfium, PdfReaderError> {
        for dir in &self.library_dirs {
            if let Ok(bindings) =
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir.as_str()))
            {
                return Ok(Pdfium::new(bindings));
            }
        }
        Pdfium::bind_to_system_library()
            .map(Pdfium::new)
            .map_err(|e| PdfReaderError::Unavailable(e.to_string()))
    }

    /// 绑定 pdfium 并加载文档后执行 `f`
    fn with_document<T>(
        &self,
        path: &Path,
        f: impl FnOnce(&PdfDocument<'_>) -> Result<T, PdfReaderError>,
    ) -> Result<T, PdfReaderError> {
        if !path.is_file() {
            return Err(PdfReaderError::LoadError(format!(
                "File not found: {}",
                path.display()
            )));
        }

        let _guard = self.lock.lock();
        let pdfium = self.bind()?;
        let document = pdfium
            .load_pdf_from_file(path, None)
            .map_err(|e| PdfReaderError::LoadError(e.to_string()))?;
        f(&document)
    }
}

impl Default for PdfiumReader {
    fn default() -> Self {
        Self::new(PdfiumReaderConfig::default())
    }
}

fn collect_bookmarks<'a>(
    bookmarks: impl Iterator<Item = PdfBookmark<'a>>,
    depth: usize,
) -> Vec<RawOutlineItem> {
    if depth >= MAX_OUTLINE_DEPTH {
        return Vec::new();
    }
    bookmarks
        .map(|bookmark| RawOutlineItem {
            title: bookmark.title(),
            page: bookmark
                .destination()
                .and_then(|d| d.page_index().ok())
                .map(|idx| idx as u32 + 1),
            children: collect_bookmarks(bookmark.iter_direct_children(), depth + 1),
        })
        .collect()
}

impl PdfReaderPort for PdfiumReader {
    fn summary(&self, path: &Path) -> Result<PdfDocumentSummary, PdfReaderError> {
        self.with_document(path, |document| {
            let doc_metadata = document.metadata();
            let mut metadata = BTreeMap::new();
            for (name, tag) in METADATA_TAGS {
                if let Some(value) = doc_metadata.get(*tag) {
                    let value = value.value().trim();
                    if !value.is_empty() {
                        metadata.insert(name.to_string(), value.to_string());
                    }
                }
            }

            Ok(PdfDocumentSummary {
                total_pages: document.pages().len() as usize,
                metadata,
            })
        })
    }

    fn page_text(&self, path: &Path, page_index: usize) -> Result<String, PdfReaderError> {
        self.with_document(path, |document| {
            let pages = document.pages();
            if page_index >= pages.len() as usize {
                return Err(PdfReaderError::PageNotFound(page_index));
            }
            let page = pages
                .get(page_index as PdfPageIndex)
                .map_err(|_| PdfReaderError::PageNotFound(page_index))?;
            let text = page
                .text()
                .map_err(|e| PdfReaderError::TextError(e.to_string()))?
                .all();
            Ok(text)
        })
    }

    fn outline(&self, path: &Path) -> Result<Vec<RawOutlineItem>, PdfReaderError> {
        self.with_document(path, |document| {
            Ok(collect_bookmarks(document.bookmarks().iter(), 0))
        })
    }
}
