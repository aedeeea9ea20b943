//! Application State
//!
//! HTTP 层共享的服务实例与请求默认值

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::application::ports::ContentCatalogPort;
use crate::application::services::{
    AudioService, CacheAdminService, ChunkedUploadService, PdfService, PreloadService,
};
use crate::domain::audio::DEFAULT_CHUNK_SIZE;
use crate::domain::pdf::RenderOptions;

/// 媒体文件 URL 配置
#[derive(Debug, Clone)]
pub struct MediaSettings {
    /// 对外 Base URL，如 `http://localhost:5060`
    pub base_url: String,
    /// 媒体根目录
    pub media_root: PathBuf,
    /// 媒体文件挂载路径
    pub url_prefix: String,
}

impl MediaSettings {
    /// 媒体根目录下文件的公开 URL，不在根目录下返回 None
    pub fn url_for(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.media_root).ok()?;
        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect();
        if parts.is_empty() {
            return None;
        }
        Some(format!(
            "{}{}/{}",
            self.base_url.trim_end_matches('/'),
            self.url_prefix,
            parts.join("/")
        ))
    }
}

/// 请求参数默认值
#[derive(Debug, Clone, Copy)]
pub struct RequestDefaults {
    pub render: RenderOptions,
    pub chunk_size: u64,
}

impl Default for RequestDefaults {
    fn default() -> Self {
        Self {
            render: RenderOptions::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// 应用状态
pub struct AppState {
    pub pdf_service: Arc<PdfService>,
    pub audio_service: Arc<AudioService>,
    pub preload_service: Arc<PreloadService>,
    pub upload_service: Arc<ChunkedUploadService>,
    pub cache_admin: Arc<CacheAdminService>,
    pub catalog: Arc<dyn ContentCatalogPort>,
    pub media: MediaSettings,
    pub defaults: RequestDefaults,
}

impl AppState {
    /// 创建应用状态
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pdf_service: Arc<PdfService>,
        audio_service: Arc<AudioService>,
        preload_service: Arc<PreloadService>,
        upload_service: Arc<ChunkedUploadService>,
        cache_admin: Arc<CacheAdminService>,
        catalog: Arc<dyn ContentCatalogPort>,
        media: MediaSettings,
        defaults: RequestDefaults,
    ) -> Self {
        Self {
            pdf_service,
            audio_service,
            preload_service,
            upload_service,
            cache_admin,
            catalog,
            media,
            defaults,
        }
    }
}
