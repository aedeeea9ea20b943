//! Audio Handlers - 范围流、信息、标记、分块

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::Response,
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio_util::io::ReaderStream;

use super::{resolve_audio, run_blocking};
use crate::application::ApplicationError;
use crate::domain::audio::{AudioMarker, MAX_CHUNK_SIZE};
use crate::infrastructure::http::dto::{parse_param, ApiResponse};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

pub const SPEED_HEADER: &str = "x-audio-speed";

// ============================================================================
// DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    pub speed: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChunkQuery {
    pub chunk_index: Option<String>,
    pub chunk_size: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AudioInfoResponse {
    pub duration: f64,
    pub file_size: u64,
    pub file_name: String,
    pub mime_type: String,
    pub bitrate: u32,
    pub sample_rate: u32,
    pub channels: u32,
    pub audio_url: Option<String>,
    pub markers: Vec<AudioMarker>,
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct SaveMarkersRequest {
    #[serde(default)]
    pub markers: Vec<AudioMarker>,
}

#[derive(Debug, Serialize)]
pub struct SaveMarkersResponse {
    pub message: String,
    pub count: usize,
}

// ============================================================================
// Handlers
// ============================================================================

fn internal(e: impl std::fmt::Display) -> ApiError {
    ApiError::Internal(format!("Failed to build response: {}", e))
}

/// 音频流，支持 `Range: bytes=start-end`
pub async fn stream_audio(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    Query(query): Query<StreamQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let speed = parse_param("speed", query.speed.as_deref(), 1.0f64)?;
    let range = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let path = resolve_audio(&state, &slug).await?;
    let service = state.audio_service.clone();
    let source = path.clone();
    let opened = run_blocking(move || service.stream_audio(&source, range.as_deref(), speed)).await?;

    let stream = match opened {
        Ok(Some(stream)) => stream,
        Ok(None) => return Err(ApiError::NotFound("Audio file not found".to_string())),
        Err(ApplicationError::RangeNotSatisfiable(message)) => {
            let file_size = tokio::fs::metadata(&path).await.ok().map(|m| m.len());
            return Err(ApiError::RangeNotSatisfiable { message, file_size });
        }
        Err(e) => return Err(e.into()),
    };

    let status = if stream.partial {
        StatusCode::PARTIAL_CONTENT
    } else {
        StatusCode::OK
    };
    let content_range = stream.content_range();
    let length = stream.content_length;

    let mut builder = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, stream.mime_type)
        .header(header::CONTENT_LENGTH, length)
        .header(header::ACCEPT_RANGES, "bytes");
    if let Some(value) = content_range {
        builder = builder.header(header::CONTENT_RANGE, value);
    }
    if let Some(speed) = stream.speed_header {
        builder = builder.header(SPEED_HEADER, speed);
    }

    let file = tokio::fs::File::from_std(stream.file).take(length);
    builder
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(internal)
}

/// 音频信息与标记
pub async fn audio_info(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<Json<ApiResponse<AudioInfoResponse>>, ApiError> {
    let path = resolve_audio(&state, &slug).await?;
    let audio_url = state.media.url_for(&path);

    let service = state.audio_service.clone();
    let (info, markers) = run_blocking(move || {
        (service.get_audio_info(&path), service.get_audio_markers(&path))
    })
    .await?;
    let info = info.ok_or_else(|| ApiError::Internal("Failed to read audio information".to_string()))?;

    Ok(Json(ApiResponse::success(AudioInfoResponse {
        duration: info.duration,
        file_size: info.file_size,
        file_name: info.file_name,
        mime_type: info.mime_type,
        bitrate: info.bitrate,
        sample_rate: info.sample_rate,
        channels: info.channels,
        audio_url,
        markers,
        metadata: info.metadata,
    })))
}

/// 读取标记
pub async fn get_audio_markers(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<Json<ApiResponse<Vec<AudioMarker>>>, ApiError> {
    let path = resolve_audio(&state, &slug).await?;
    let service = state.audio_service.clone();
    let markers = run_blocking(move || service.get_audio_markers(&path)).await?;
    Ok(Json(ApiResponse::success(markers)))
}

/// 整体替换标记
pub async fn save_audio_markers(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    Json(req): Json<SaveMarkersRequest>,
) -> Result<(StatusCode, Json<ApiResponse<SaveMarkersResponse>>), ApiError> {
    let path = resolve_audio(&state, &slug).await?;
    let service = state.audio_service.clone();
    let count = req.markers.len();
    run_blocking(move || service.create_audio_markers(&path, &req.markers)).await??;

    tracing::info!(slug = %slug, count = count, "Audio markers replaced");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(SaveMarkersResponse {
            message: "Markers saved".to_string(),
            count,
        })),
    ))
}

/// 二进制分块
pub async fn audio_chunk(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    Query(query): Query<ChunkQuery>,
) -> Result<Response, ApiError> {
    let chunk_index = parse_param::<u64>("chunk_index", query.chunk_index.as_deref(), 0)?;
    let chunk_size =
        parse_param::<u64>("chunk_size", query.chunk_size.as_deref(), state.defaults.chunk_size)?;
    if chunk_size == 0 || chunk_size > MAX_CHUNK_SIZE {
        return Err(ApiError::BadRequest(format!(
            "chunk_size must be between 1 and {}",
            MAX_CHUNK_SIZE
        )));
    }

    let path = resolve_audio(&state, &slug).await?;
    let service = state.audio_service.clone();
    let layout = {
        let service = service.clone();
        let path = path.clone();
        run_blocking(move || service.chunk_layout(&path, chunk_size)).await??
    }
    .ok_or_else(|| ApiError::NotFound("Audio file not found".to_string()))?;

    if chunk_index >= layout.num_chunks {
        return Err(ApiError::BadRequest(format!(
            "chunk_index {} out of range ({} chunks)",
            chunk_index, layout.num_chunks
        )));
    }

    let chunk = run_blocking(move || service.get_audio_chunk(&path, chunk_index, chunk_size))
        .await?
        .ok_or_else(|| ApiError::Internal(format!("Failed to read chunk {}", chunk_index)))?;

    let disposition = format!("attachment; filename=\"{}_chunk_{}.bin\"", slug, chunk_index);
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(header::CONTENT_LENGTH, chunk.len())
        .header(
            header::CONTENT_DISPOSITION,
            HeaderValue::from_str(&disposition).map_err(internal)?,
        )
        .header("x-chunk-count", layout.num_chunks)
        .body(Body::from(chunk))
        .map_err(internal)
}
