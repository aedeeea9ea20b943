//! 应用层错误定义
//!
//! 服务层允许显式失败的操作（标记、上传、缓存维护、任务入队）使用的错误类型

use thiserror::Error;

use crate::application::ports::{CatalogError, FileCacheError, TaskError};
use crate::domain::audio::AudioError;
use crate::domain::cache::CacheKeyError;
use crate::domain::pdf::PdfError;

/// 应用层错误
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// 资源未找到
    #[error("{resource_type} not found: {id}")]
    NotFound {
        resource_type: &'static str,
        id: String,
    },

    /// 验证错误
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// 请求范围无法满足
    #[error("Range not satisfiable: {0}")]
    RangeNotSatisfiable(String),

    /// 外部服务/依赖不可用
    #[error("External service error: {0}")]
    ExternalServiceError(String),

    /// 存储错误
    #[error("Storage error: {0}")]
    StorageError(String),

    /// 内部错误
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ApplicationError {
    /// 创建 NotFound 错误
    pub fn not_found(resource_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource_type,
            id: id.into(),
        }
    }

    /// 创建验证错误
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError(message.into())
    }

    /// 创建外部依赖不可用错误
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::ExternalServiceError(message.into())
    }

    /// 创建内部错误
    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalError(message.into())
    }
}

impl From<FileCacheError> for ApplicationError {
    fn from(err: FileCacheError) -> Self {
        match err {
            FileCacheError::SourceNotFound(path) => Self::not_found("File", path),
            other => Self::StorageError(other.to_string()),
        }
    }
}

impl From<TaskError> for ApplicationError {
    fn from(err: TaskError) -> Self {
        match err {
            TaskError::NotFound(id) => Self::not_found("Task", id),
            other => Self::InternalError(other.to_string()),
        }
    }
}

impl From<CatalogError> for ApplicationError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::NotFound(slug) => Self::not_found("Content", slug),
            CatalogError::InvalidSlug(slug) => {
                Self::ValidationError(format!("Invalid content slug: {}", slug))
            }
            CatalogError::IoError(msg) => Self::StorageError(msg),
        }
    }
}

impl From<PdfError> for ApplicationError {
    fn from(err: PdfError) -> Self {
        Self::ValidationError(err.to_string())
    }
}

impl From<AudioError> for ApplicationError {
    fn from(err: AudioError) -> Self {
        match err {
            AudioError::RangeNotSatisfiable { .. } => Self::RangeNotSatisfiable(err.to_string()),
            other => Self::ValidationError(other.to_string()),
        }
    }
}

impl From<CacheKeyError> for ApplicationError {
    fn from(err: CacheKeyError) -> Self {
        Self::ValidationError(err.to_string())
    }
}

impl From<std::io::Error> for ApplicationError {
    fn from(err: std::io::Error) -> Self {
        Self::StorageError(err.to_string())
    }
}
