//! Audio Probe Port - 音频编码参数与标签读取

use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AudioProbeError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Unsupported audio format: {0}")]
    Unsupported(String),
}

/// 探测结果，缺失的数值字段为 0
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioTags {
    pub duration: f64,
    pub bitrate: u32,
    pub sample_rate: u32,
    pub channels: u32,
    pub metadata: BTreeMap<String, String>,
}

pub trait AudioProbePort: Send + Sync {
    fn probe(&self, path: &Path) -> Result<AudioTags, AudioProbeError>;
}
