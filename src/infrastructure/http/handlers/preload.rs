//! Preload Handlers - 后台预加载任务入队与状态查询

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use super::{resolve_audio, resolve_pdf};
use crate::application::services::{PreloadKind, PreloadStatus};
use crate::domain::audio::MAX_CHUNK_SIZE;
use crate::domain::pdf::{ImageFormat, RenderOptions};
use crate::infrastructure::http::dto::{ApiResponse, TaskAccepted};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::extractors::OptionalJson;
use crate::infrastructure::http::state::AppState;

// ============================================================================
// DTOs
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct PreloadImagesRequest {
    /// `[start, end]`，1 起始的闭区间
    pub page_range: Option<[u32; 2]>,
    pub format: Option<String>,
    pub dpi: Option<u32>,
    pub quality: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PreloadChunkRequest {
    pub chunk_size: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct TaskStatusQuery {
    pub task_id: Option<String>,
    pub task_type: Option<String>,
}

fn accepted(task_id: String, message: &str) -> Json<ApiResponse<TaskAccepted>> {
    Json(ApiResponse::success(TaskAccepted {
        task_id,
        message: message.to_string(),
    }))
}

// ============================================================================
// Handlers
// ============================================================================

/// 预热文档信息与文本
pub async fn preload_pdf(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<Json<ApiResponse<TaskAccepted>>, ApiError> {
    let path = resolve_pdf(&state, &slug).await?;
    let task_id = state.preload_service.preload_pdf(&path, None)?;
    Ok(accepted(task_id, "PDF preload started"))
}

/// 预渲染页面图片
pub async fn preload_pdf_images(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    OptionalJson(req): OptionalJson<PreloadImagesRequest>,
) -> Result<Json<ApiResponse<TaskAccepted>>, ApiError> {
    let defaults = state.defaults.render;

    let format = match req.format.as_deref() {
        Some(raw) => ImageFormat::parse_or_default(Some(raw)),
        None => defaults.format,
    };
    let options = RenderOptions::new(
        format,
        req.dpi.unwrap_or(defaults.dpi),
        req.quality.unwrap_or(defaults.quality as u32),
    )
    .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let page_range = req.page_range.map(|[start, end]| (start, end));
    if let Some((start, end)) = page_range {
        if start > end {
            return Err(ApiError::BadRequest(format!(
                "Invalid page_range: {} > {}",
                start, end
            )));
        }
    }

    let path = resolve_pdf(&state, &slug).await?;
    let task_id = state
        .preload_service
        .preload_pdf_images(&path, page_range, options, None)?;
    Ok(accepted(task_id, "PDF image preload started"))
}

/// 预热音频信息与标记
pub async fn preload_audio(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<Json<ApiResponse<TaskAccepted>>, ApiError> {
    let path = resolve_audio(&state, &slug).await?;
    let task_id = state.preload_service.preload_audio(&path, None)?;
    Ok(accepted(task_id, "Audio preload started"))
}

/// 预热第一个音频分块
pub async fn preload_audio_chunk(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    OptionalJson(req): OptionalJson<PreloadChunkRequest>,
) -> Result<Json<ApiResponse<TaskAccepted>>, ApiError> {
    let chunk_size = req.chunk_size.unwrap_or(state.defaults.chunk_size);
    if chunk_size == 0 || chunk_size > MAX_CHUNK_SIZE {
        return Err(ApiError::BadRequest(format!(
            "chunk_size must be between 1 and {}",
            MAX_CHUNK_SIZE
        )));
    }

    let path = resolve_audio(&state, &slug).await?;
    let task_id = state
        .preload_service
        .preload_audio_chunk(&path, chunk_size, None)?;
    Ok(accepted(task_id, "Audio chunk preload started"))
}

/// 任务状态
pub async fn task_status(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TaskStatusQuery>,
) -> Result<Json<ApiResponse<PreloadStatus>>, ApiError> {
    let task_id = query
        .task_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("task_id is required".to_string()))?;

    let task_type = query.task_type.as_deref().unwrap_or("pdf");
    let kind = PreloadKind::parse(task_type)
        .ok_or_else(|| ApiError::BadRequest(format!("Invalid task_type: {}", task_type)))?;

    let status = state
        .preload_service
        .get_preload_status_of(&task_id, kind)
        .ok_or_else(|| ApiError::NotFound(format!("Task not found: {}", task_id)))?;
    Ok(Json(ApiResponse::success(status)))
}
