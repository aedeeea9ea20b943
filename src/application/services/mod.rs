//! Application Services - PDF / 音频 / 预加载 / 上传 / 缓存维护

mod audio_service;
mod cache_admin;
mod pdf_service;
mod preload_service;
mod single_flight;
mod upload_service;

#[cfg(test)]
pub(crate) mod testing;

pub use audio_service::{AudioService, AudioServiceConfig, AudioStream};
pub use cache_admin::{CacheAdminService, CacheStats, ClearReport};
pub use pdf_service::{PdfService, PdfServiceConfig, RenderedPage};
pub use preload_service::{PreloadKind, PreloadService, PreloadStatus};
pub use single_flight::SingleFlight;
pub use upload_service::{
    ChunkedUploadConfig, ChunkedUploadService, UploadChunk, UploadError, UploadProgress,
};
