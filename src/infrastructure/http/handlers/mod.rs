//! HTTP Handlers

mod audio;
mod cache;
mod pdf;
mod ping;
mod preload;
mod upload;

pub use audio::*;
pub use cache::*;
pub use pdf::*;
pub use ping::*;
pub use preload::*;
pub use upload::*;

use std::path::PathBuf;

use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

/// 在阻塞线程池中执行同步服务调用
pub(crate) async fn run_blocking<F, T>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    Ok(tokio::task::spawn_blocking(f).await?)
}

/// 内容的 PDF 文件
pub(crate) async fn resolve_pdf(state: &AppState, slug: &str) -> Result<PathBuf, ApiError> {
    state
        .catalog
        .resolve(slug)
        .await?
        .pdf_path
        .ok_or_else(|| ApiError::NotFound(format!("Content {} has no PDF file", slug)))
}

/// 内容的音频文件
pub(crate) async fn resolve_audio(state: &AppState, slug: &str) -> Result<PathBuf, ApiError> {
    state
        .catalog
        .resolve(slug)
        .await?
        .audio_path
        .ok_or_else(|| ApiError::NotFound(format!("Content {} has no audio file", slug)))
}
