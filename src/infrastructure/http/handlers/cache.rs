//! Cache Handlers - 统计与清理

use axum::{extract::State, Json};
use serde::Deserialize;
use std::sync::Arc;

use super::run_blocking;
use crate::application::services::{CacheStats, ClearReport};
use crate::infrastructure::http::dto::ApiResponse;
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::extractors::OptionalJson;
use crate::infrastructure::http::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ClearCacheRequest {
    /// `pdf` / `audio`；缺省清空全部
    pub cache_type: Option<String>,
}

/// 缓存统计
pub async fn cache_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<CacheStats>>, ApiError> {
    let admin = state.cache_admin.clone();
    let stats = run_blocking(move || admin.stats()).await?;
    Ok(Json(ApiResponse::success(stats)))
}

/// 清空缓存
pub async fn clear_cache(
    State(state): State<Arc<AppState>>,
    OptionalJson(req): OptionalJson<ClearCacheRequest>,
) -> Result<Json<ApiResponse<ClearReport>>, ApiError> {
    let admin = state.cache_admin.clone();
    let report = run_blocking(move || admin.clear(req.cache_type.as_deref())).await??;
    Ok(Json(ApiResponse::success(report)))
}
