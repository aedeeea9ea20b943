//! HTTP Routes
//!
//! API Endpoints:
//! - /api/ping                                          GET   健康检查
//! - /api/books/:slug/pdf/structure                     GET   文档信息与目录
//! - /api/books/:slug/pdf/text?page=                    GET   单页文本
//! - /api/books/:slug/pdf/image?page=&format=&dpi=..    GET   单页图片
//! - /api/books/:slug/audio/stream?speed=               GET   音频流（支持 Range）
//! - /api/books/:slug/audio/info                        GET   音频信息与标记
//! - /api/books/:slug/audio/markers                     GET   读取标记 / POST 替换标记
//! - /api/books/:slug/audio/chunk?chunk_index=&chunk_size=  GET  二进制分块
//! - /api/async/books/:slug/preload_pdf                 POST  预热文本
//! - /api/async/books/:slug/preload_pdf_images          POST  预渲染图片
//! - /api/async/books/:slug/preload_audio               POST  预热音频信息
//! - /api/async/books/:slug/preload_audio_chunk         POST  预热首个分块
//! - /api/async/tasks/status?task_id=&task_type=        GET   任务状态
//! - /api/upload/chunk                                  POST  分块上传
//! - /api/cache/stats                                   GET   缓存统计
//! - /api/cache/clear                                   POST  清空缓存

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::handlers;
use super::state::AppState;

/// 创建所有路由
pub fn create_routes() -> Router<Arc<AppState>> {
    Router::new().nest("/api", api_routes())
}

/// API 路由
fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ping", get(handlers::ping))
        .nest("/books/:slug", book_routes())
        .nest("/async", async_routes())
        .route("/upload/chunk", post(handlers::upload_chunk))
        .nest("/cache", cache_routes())
}

/// Book 路由
fn book_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/pdf/structure", get(handlers::pdf_structure))
        .route("/pdf/text", get(handlers::pdf_text))
        .route("/pdf/image", get(handlers::pdf_image))
        .route("/audio/stream", get(handlers::stream_audio))
        .route("/audio/info", get(handlers::audio_info))
        .route(
            "/audio/markers",
            get(handlers::get_audio_markers).post(handlers::save_audio_markers),
        )
        .route("/audio/chunk", get(handlers::audio_chunk))
}

/// 预加载路由
fn async_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/books/:slug/preload_pdf", post(handlers::preload_pdf))
        .route("/books/:slug/preload_pdf_images", post(handlers::preload_pdf_images))
        .route("/books/:slug/preload_audio", post(handlers::preload_audio))
        .route("/books/:slug/preload_audio_chunk", post(handlers::preload_audio_chunk))
        .route("/tasks/status", get(handlers::task_status))
}

/// Cache 路由
fn cache_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/stats", get(handlers::cache_stats))
        .route("/clear", post(handlers::clear_cache))
}
