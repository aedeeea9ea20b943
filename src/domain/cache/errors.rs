//! Cache Context - Errors

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CacheKeyError {
    #[error("无效的缓存类型: {0}")]
    InvalidCacheType(String),
}
