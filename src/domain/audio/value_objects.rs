//! Audio Context - Value Objects

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use super::errors::AudioError;

pub const DEFAULT_CHUNK_SIZE: u64 = 1024 * 1024;
pub const MAX_CHUNK_SIZE: u64 = 64 * 1024 * 1024;
const MAX_SPEED: f64 = 4.0;

/// 扩展名 -> MIME
const AUDIO_FORMATS: &[(&str, &str)] = &[
    ("mp3", "audio/mpeg"),
    ("mp4", "audio/mp4"),
    ("m4a", "audio/mp4"),
    ("ogg", "audio/ogg"),
    ("oga", "audio/ogg"),
    ("flac", "audio/flac"),
    ("wav", "audio/wav"),
    ("aac", "audio/aac"),
];

/// 支持的音频扩展名
pub const SUPPORTED_EXTENSIONS: &[&str] = &["mp3", "mp4", "m4a", "ogg", "oga", "flac", "wav", "aac"];

/// 根据扩展名推断 MIME 类型，未知扩展名返回 `application/octet-stream`
pub fn mime_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    AUDIO_FORMATS
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, mime)| *mime)
        .unwrap_or("application/octet-stream")
}

/// 闭区间字节范围 `[start, end]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// 解析 `Range` 请求头
    ///
    /// - `Ok(None)`：请求头无法识别，按完整响应处理
    /// - `bytes=start-end`：end 缺省为文件末尾，超出文件大小时截断
    /// - `bytes=-N`：最后 N 个字节
    /// - 多段范围只取第一段
    pub fn parse(header: &str, file_size: u64) -> Result<Option<Self>, AudioError> {
        let Some(ranges) = header.trim().strip_prefix("bytes=") else {
            return Ok(None);
        };
        let first = ranges.split(',').next().unwrap_or("").trim();
        let Some((start_str, end_str)) = first.split_once('-') else {
            return Ok(None);
        };
        let (start_str, end_str) = (start_str.trim(), end_str.trim());

        if start_str.is_empty() {
            // 后缀范围
            let Ok(suffix) = end_str.parse::<u64>() else {
                return Ok(None);
            };
            if suffix == 0 || file_size == 0 {
                return Err(AudioError::RangeNotSatisfiable { file_size });
            }
            let len = suffix.min(file_size);
            return Ok(Some(Self {
                start: file_size - len,
                end: file_size - 1,
            }));
        }

        let Ok(start) = start_str.parse::<u64>() else {
            return Ok(None);
        };
        let end = if end_str.is_empty() {
            None
        } else {
            match end_str.parse::<u64>() {
                Ok(v) => Some(v),
                Err(_) => return Ok(None),
            }
        };

        if start >= file_size {
            return Err(AudioError::RangeNotSatisfiable { file_size });
        }
        let end = end.map(|e| e.min(file_size - 1)).unwrap_or(file_size - 1);
        if end < start {
            return Err(AudioError::RangeNotSatisfiable { file_size });
        }

        Ok(Some(Self { start, end }))
    }

    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// `Content-Range` 头值
    pub fn content_range(&self, file_size: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, file_size)
    }
}

/// 校验播放速度，范围 (0, 4]
pub fn validate_speed(speed: f64) -> Result<f64, AudioError> {
    if !speed.is_finite() || speed <= 0.0 || speed > MAX_SPEED {
        return Err(AudioError::InvalidSpeed(speed));
    }
    Ok(speed)
}

/// 仅当速度不为 1.0 时返回 `X-Audio-Speed` 头值
pub fn speed_header_value(speed: f64) -> Option<String> {
    if (speed - 1.0).abs() < f64::EPSILON {
        None
    } else {
        Some(speed.to_string())
    }
}

/// 时间轴标记
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioMarker {
    pub time: f64,
    pub label: String,
}

/// 校验标记列表：time 必须是非负有限数
pub fn validate_markers(markers: &[AudioMarker]) -> Result<(), AudioError> {
    for (idx, marker) in markers.iter().enumerate() {
        if !marker.time.is_finite() || marker.time < 0.0 {
            return Err(AudioError::InvalidMarker(format!(
                "marker {} has invalid time {}",
                idx, marker.time
            )));
        }
    }
    Ok(())
}

/// 固定大小分块布局
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkLayout {
    pub file_size: u64,
    pub chunk_size: u64,
    pub num_chunks: u64,
}

impl ChunkLayout {
    pub fn new(file_size: u64, chunk_size: u64) -> Result<Self, AudioError> {
        if chunk_size == 0 || chunk_size > MAX_CHUNK_SIZE {
            return Err(AudioError::InvalidChunkSize(chunk_size));
        }
        Ok(Self {
            file_size,
            chunk_size,
            num_chunks: file_size.div_ceil(chunk_size),
        })
    }

    /// 分块对应的字节范围
    pub fn range_of(&self, index: u64) -> Result<ByteRange, AudioError> {
        if index >= self.num_chunks {
            return Err(AudioError::ChunkOutOfRange {
                index,
                num_chunks: self.num_chunks,
            });
        }
        let start = index * self.chunk_size;
        let end = (start + self.chunk_size).min(self.file_size) - 1;
        Ok(ByteRange { start, end })
    }
}

/// 音频信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioInfo {
    pub mime_type: String,
    pub file_size: u64,
    /// 时长（秒）
    pub duration: f64,
    pub bitrate: u32,
    pub sample_rate: u32,
    pub channels: u32,
    pub metadata: BTreeMap<String, String>,
    pub file_name: String,
}
