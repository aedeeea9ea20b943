//! Filesystem Content Catalog
//!
//! 实现 ContentCatalogPort：`<books_dir>/<slug>.pdf` 与 `<audio_dir>/<slug>.<ext>`

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::application::ports::{CatalogError, ContentCatalogPort, ContentRecord};
use crate::domain::audio::SUPPORTED_EXTENSIONS;

/// 文件系统内容目录
pub struct FsContentCatalog {
    books_dir: PathBuf,
    audio_dir: PathBuf,
}

impl FsContentCatalog {
    pub fn new(books_dir: impl AsRef<Path>, audio_dir: impl AsRef<Path>) -> Self {
        Self {
            books_dir: books_dir.as_ref().to_path_buf(),
            audio_dir: audio_dir.as_ref().to_path_buf(),
        }
    }

    /// slug 只允许 `[a-z0-9-_]`
    fn validate_slug(slug: &str) -> Result<(), CatalogError> {
        let valid = !slug.is_empty()
            && slug.len() <= 128
            && slug
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
        if valid {
            Ok(())
        } else {
            Err(CatalogError::InvalidSlug(slug.to_string()))
        }
    }

    async fn existing_file(path: PathBuf) -> Option<PathBuf> {
        match fs::metadata(&path).await {
            Ok(m) if m.is_file() => Some(path),
            _ => None,
        }
    }
}

#[async_trait]
impl ContentCatalogPort for FsContentCatalog {
    async fn resolve(&self, slug: &str) -> Result<ContentRecord, CatalogError> {
        Self::validate_slug(slug)?;

        let pdf_path = Self::existing_file(self.books_dir.join(format!("{}.pdf", slug))).await;

        let mut audio_path = None;
        for ext in SUPPORTED_EXTENSIONS {
            if let Some(p) = Self::existing_file(self.audio_dir.join(format!("{}.{}", slug, ext))).await
            {
                audio_path = Some(p);
                break;
            }
        }

        if pdf_path.is_none() && audio_path.is_none() {
            return Err(CatalogError::NotFound(slug.to_string()));
        }

        Ok(ContentRecord {
            slug: slug.to_string(),
            pdf_path,
            audio_path,
        })
    }
}
