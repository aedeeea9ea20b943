//! Upload Handlers - 分块上传

use axum::{
    extract::{Multipart, State},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use super::run_blocking;
use crate::application::services::{UploadChunk, UploadProgress};
use crate::infrastructure::http::dto::{parse_param, ApiResponse};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum UploadResponse {
    #[serde(rename = "progress", rename_all = "camelCase")]
    Progress {
        message: String,
        received_chunks: u32,
        total_chunks: u32,
    },
    #[serde(rename = "success", rename_all = "camelCase")]
    Success {
        message: String,
        file_name: String,
        file_path: String,
        file_url: Option<String>,
        md5: String,
    },
}

async fn field_text(field: axum::extract::multipart::Field<'_>, name: &str) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed to read {}: {}", name, e)))
}

/// 接收一个上传分块
pub async fn upload_chunk(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<UploadResponse>>, ApiError> {
    let mut data: Option<Vec<u8>> = None;
    let mut file_name: Option<String> = None;
    let mut upload_id: Option<String> = None;
    let mut chunk_index: Option<String> = None;
    let mut total_chunks: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        ApiError::BadRequest(format!("Failed to read multipart field: {}", e))
    })? {
        let field_name = field.name().unwrap_or_default().to_string();

        match field_name.as_str() {
            "file" => {
                data = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| ApiError::BadRequest(format!("Failed to read file: {}", e)))?
                        .to_vec(),
                );
            }
            "fileName" => file_name = Some(field_text(field, "fileName").await?),
            "uploadId" => upload_id = Some(field_text(field, "uploadId").await?),
            "chunkIndex" => chunk_index = Some(field_text(field, "chunkIndex").await?),
            "totalChunks" => total_chunks = Some(field_text(field, "totalChunks").await?),
            _ => {}
        }
    }

    let (Some(data), Some(file_name), Some(upload_id)) = (data, file_name, upload_id) else {
        return Err(ApiError::BadRequest(
            "Missing parameters. Required: file, fileName, uploadId".to_string(),
        ));
    };
    let chunk_index = parse_param::<u32>("chunkIndex", chunk_index.as_deref(), 0)?;
    let total_chunks = parse_param::<u32>("totalChunks", total_chunks.as_deref(), 1)?;

    let service = state.upload_service.clone();
    let progress = run_blocking(move || {
        service.accept_chunk(UploadChunk {
            upload_id: &upload_id,
            file_name: &file_name,
            chunk_index,
            total_chunks,
            data: &data,
        })
    })
    .await??;

    let response = match progress {
        UploadProgress::Progress {
            received_chunks,
            total_chunks,
        } => UploadResponse::Progress {
            message: format!("Chunk {} of {} received", chunk_index + 1, total_chunks),
            received_chunks,
            total_chunks,
        },
        UploadProgress::Complete {
            file_name,
            file_path,
            md5,
        } => {
            let file_url = state.media.url_for(&file_path);
            let shown_path = file_path
                .strip_prefix(&state.media.media_root)
                .unwrap_or(&file_path)
                .to_string_lossy()
                .replace('\\', "/");
            UploadResponse::Success {
                message: "Upload complete".to_string(),
                file_name,
                file_path: shown_path,
                file_url,
                md5,
            }
        }
    };

    Ok(Json(ApiResponse::success(response)))
}
