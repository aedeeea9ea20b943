//! Audio Context - Errors

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum AudioError {
    #[error("请求范围无法满足 (文件大小 {file_size})")]
    RangeNotSatisfiable { file_size: u64 },

    #[error("无效的播放速度: {0}")]
    InvalidSpeed(f64),

    #[error("无效的标记: {0}")]
    InvalidMarker(String),

    #[error("无效的分块大小: {0}")]
    InvalidChunkSize(u64),

    #[error("分块索引超出范围: {index} (共 {num_chunks} 块)")]
    ChunkOutOfRange { index: u64, num_chunks: u64 },
}
