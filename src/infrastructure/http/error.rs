//! HTTP Error Handling
//!
//! 所有错误渲染为 `{errno, error, data}`，HTTP 状态码与 errno 一致

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;

use crate::application::services::UploadError;
use crate::application::ApplicationError;

/// 统一错误响应格式
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub errno: i32,
    pub error: String,
    pub data: Option<Value>,
}

impl ErrorResponse {
    pub fn new(errno: i32, error: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            errno,
            error: error.into(),
            data,
        }
    }
}

/// 错误码定义
pub mod errno {
    pub const BAD_REQUEST: i32 = 400;
    pub const NOT_FOUND: i32 = 404;
    pub const RANGE_NOT_SATISFIABLE: i32 = 416;
    pub const INTERNAL_ERROR: i32 = 500;
    pub const SERVICE_UNAVAILABLE: i32 = 503;
}

/// API 错误
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    RangeNotSatisfiable {
        message: String,
        file_size: Option<u64>,
    },
    Internal(String),
    /// 依赖不可用；`data` 携带客户端可用的回退信息（如 pdf_url）
    ServiceUnavailable {
        message: String,
        data: Option<Value>,
    },
}

impl ApiError {
    pub fn unavailable(message: impl Into<String>, data: Option<Value>) -> Self {
        ApiError::ServiceUnavailable {
            message: message.into(),
            data,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::RangeNotSatisfiable { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut content_range = None;

        let body = match self {
            ApiError::NotFound(msg) => {
                tracing::warn!(errno = errno::NOT_FOUND, error = %msg, "Resource not found");
                ErrorResponse::new(errno::NOT_FOUND, msg, None)
            }
            ApiError::BadRequest(msg) => {
                tracing::warn!(errno = errno::BAD_REQUEST, error = %msg, "Bad request");
                ErrorResponse::new(errno::BAD_REQUEST, msg, None)
            }
            ApiError::RangeNotSatisfiable { message, file_size } => {
                tracing::warn!(errno = errno::RANGE_NOT_SATISFIABLE, error = %message, "Range not satisfiable");
                content_range = file_size.map(|size| format!("bytes */{}", size));
                ErrorResponse::new(errno::RANGE_NOT_SATISFIABLE, message, None)
            }
            ApiError::Internal(msg) => {
                tracing::error!(errno = errno::INTERNAL_ERROR, error = %msg, "Internal server error");
                ErrorResponse::new(errno::INTERNAL_ERROR, msg, None)
            }
            ApiError::ServiceUnavailable { message, data } => {
                tracing::error!(errno = errno::SERVICE_UNAVAILABLE, error = %message, "Service unavailable");
                ErrorResponse::new(errno::SERVICE_UNAVAILABLE, message, data)
            }
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(value) = content_range.and_then(|v| v.parse().ok()) {
            response.headers_mut().insert(header::CONTENT_RANGE, value);
        }
        response
    }
}

impl From<ApplicationError> for ApiError {
    fn from(e: ApplicationError) -> Self {
        match e {
            ApplicationError::NotFound { resource_type, id } => {
                ApiError::NotFound(format!("{} not found: {}", resource_type, id))
            }
            ApplicationError::ValidationError(msg) => ApiError::BadRequest(msg),
            ApplicationError::RangeNotSatisfiable(message) => ApiError::RangeNotSatisfiable {
                message,
                file_size: None,
            },
            ApplicationError::ExternalServiceError(msg) => ApiError::unavailable(msg, None),
            ApplicationError::StorageError(msg) => ApiError::Internal(msg),
            ApplicationError::InternalError(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<crate::application::ports::CatalogError> for ApiError {
    fn from(e: crate::application::ports::CatalogError) -> Self {
        ApplicationError::from(e).into()
    }
}

impl From<UploadError> for ApiError {
    fn from(e: UploadError) -> Self {
        ApplicationError::from(e).into()
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        ApiError::Internal(format!("Blocking task failed: {}", e))
    }
}
