//! PDF Handlers - 结构、文本、页面图片

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::{resolve_pdf, run_blocking};
use crate::domain::pdf::{check_page_number, ImageFormat, OutlineNode, PdfInfo, RenderOptions};
use crate::infrastructure::http::dto::{parse_flag, parse_param, ApiResponse};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

const PDF_URL_HINT: &str =
    "Use this URL to access the PDF directly; the client can render it with a PDF viewer.";

// ============================================================================
// DTOs
// ============================================================================

#[derive(Debug, Serialize)]
pub struct PdfStructureResponse {
    pub total_pages: usize,
    pub metadata: BTreeMap<String, String>,
    pub file_name: String,
    pub file_size: u64,
    pub outline: Vec<OutlineNode>,
}

#[derive(Debug, Serialize)]
pub struct PdfTextResponse {
    pub total_pages: usize,
    pub current_page: u32,
    pub text: String,
    pub metadata: BTreeMap<String, String>,
    pub file_name: String,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PageImageQuery {
    pub page: Option<String>,
    pub format: Option<String>,
    pub dpi: Option<String>,
    pub quality: Option<String>,
    pub use_cache: Option<String>,
    pub url_only: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum PdfImageResponse {
    Image {
        total_pages: usize,
        current_page: u32,
        image: String,
        pdf_url: Option<String>,
        format: ImageFormat,
        dpi: u32,
        quality: u8,
        cached: bool,
    },
    UrlOnly {
        total_pages: usize,
        pdf_url: Option<String>,
        message: &'static str,
    },
}

// ============================================================================
// Handlers
// ============================================================================

async fn load_info(state: &Arc<AppState>, path: std::path::PathBuf) -> Result<PdfInfo, ApiError> {
    let service = state.pdf_service.clone();
    run_blocking(move || service.get_pdf_info(&path))
        .await?
        .ok_or_else(|| ApiError::Internal("Failed to read PDF information".to_string()))
}

fn checked_page(raw: Option<&str>, total_pages: usize) -> Result<u32, ApiError> {
    let page = parse_param::<u32>("page", raw, 1)?;
    check_page_number(page, total_pages).map_err(|_| {
        ApiError::BadRequest(format!(
            "Invalid page number {}. The PDF has {} pages.",
            page, total_pages
        ))
    })?;
    Ok(page)
}

/// 文档信息与目录
pub async fn pdf_structure(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<Json<ApiResponse<PdfStructureResponse>>, ApiError> {
    let path = resolve_pdf(&state, &slug).await?;
    let info = load_info(&state, path.clone()).await?;

    let service = state.pdf_service.clone();
    let structure = run_blocking(move || service.get_pdf_structure(&path))
        .await?
        .ok_or_else(|| ApiError::Internal("Failed to read PDF structure".to_string()))?;

    Ok(Json(ApiResponse::success(PdfStructureResponse {
        total_pages: info.total_pages,
        metadata: info.metadata,
        file_name: info.file_name,
        file_size: info.file_size,
        outline: structure.outline,
    })))
}

/// 单页文本
pub async fn pdf_text(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ApiResponse<PdfTextResponse>>, ApiError> {
    let path = resolve_pdf(&state, &slug).await?;
    let info = load_info(&state, path.clone()).await?;
    let page = checked_page(query.page.as_deref(), info.total_pages)?;

    let service = state.pdf_service.clone();
    let text = run_blocking(move || service.get_page_text(&path, page))
        .await?
        .ok_or_else(|| ApiError::Internal(format!("Failed to extract text from page {}", page)))?;

    Ok(Json(ApiResponse::success(PdfTextResponse {
        total_pages: info.total_pages,
        current_page: page,
        text,
        metadata: info.metadata,
        file_name: info.file_name,
    })))
}

/// 单页图片（base64 data URI）
pub async fn pdf_image(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    Query(query): Query<PageImageQuery>,
) -> Result<Json<ApiResponse<PdfImageResponse>>, ApiError> {
    let defaults = state.defaults.render;
    let format = match query.format.as_deref() {
        Some(raw) => ImageFormat::parse_or_default(Some(raw)),
        None => defaults.format,
    };
    let dpi = parse_param("dpi", query.dpi.as_deref(), defaults.dpi)?;
    let quality = parse_param("quality", query.quality.as_deref(), defaults.quality as u32)?;
    let options = RenderOptions::new(format, dpi, quality)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let use_cache = parse_flag(query.use_cache.as_deref(), true);

    let path = resolve_pdf(&state, &slug).await?;
    let pdf_url = state.media.url_for(&path);
    let info = load_info(&state, path.clone()).await?;
    let page = checked_page(query.page.as_deref(), info.total_pages)?;

    let fallback = json!({
        "total_pages": info.total_pages,
        "pdf_url": pdf_url,
        "message": PDF_URL_HINT,
    });

    if parse_flag(query.url_only.as_deref(), false) {
        return Ok(Json(ApiResponse::success(PdfImageResponse::UrlOnly {
            total_pages: info.total_pages,
            pdf_url,
            message: PDF_URL_HINT,
        })));
    }

    if !state.pdf_service.rasterizer_available() {
        return Err(ApiError::unavailable(
            "PDF rasterizer is not available; page images cannot be produced",
            Some(fallback),
        ));
    }

    let service = state.pdf_service.clone();
    let rendered = run_blocking(move || service.render_page(&path, page, &options, use_cache))
        .await?
        .ok_or_else(|| {
            ApiError::unavailable(format!("Failed to render page {}", page), Some(fallback))
        })?;

    Ok(Json(ApiResponse::success(PdfImageResponse::Image {
        total_pages: info.total_pages,
        current_page: page,
        image: options.format.data_uri(&rendered.to_base64()),
        pdf_url,
        format: options.format,
        dpi: options.dpi,
        quality: options.quality,
        cached: rendered.cache_hit,
    })))
}
