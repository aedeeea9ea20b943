//! Cache Context - Value Objects

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use super::errors::CacheKeyError;

/// 缓存类型，对应缓存根目录下的一个子目录
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheType {
    Pdf,
    Audio,
    Custom(String),
}

impl CacheType {
    /// 缓存目录名：`pdf_cache` / `audio_cache` / `{name}_cache`
    pub fn dir_name(&self) -> String {
        match self {
            CacheType::Pdf => "pdf_cache".to_string(),
            CacheType::Audio => "audio_cache".to_string(),
            CacheType::Custom(name) => format!("{}_cache", name),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            CacheType::Pdf => "pdf",
            CacheType::Audio => "audio",
            CacheType::Custom(name) => name,
        }
    }

    /// 解析缓存类型名，自定义类型只允许 `[a-z0-9_]`
    pub fn parse(s: &str) -> Result<Self, CacheKeyError> {
        let name = s.trim().to_lowercase();
        match name.as_str() {
            "pdf" => Ok(CacheType::Pdf),
            "audio" => Ok(CacheType::Audio),
            "" => Err(CacheKeyError::InvalidCacheType(s.to_string())),
            other => {
                if other
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
                {
                    Ok(CacheType::Custom(other.to_string()))
                } else {
                    Err(CacheKeyError::InvalidCacheType(s.to_string()))
                }
            }
        }
    }

    /// 内置缓存类型
    pub fn builtin() -> [CacheType; 2] {
        [CacheType::Pdf, CacheType::Audio]
    }
}

impl fmt::Display for CacheType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 源文件版本标识：路径 + 修改时间（纳秒）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceStamp {
    pub path: PathBuf,
    pub modified_nanos: u128,
    pub size: u64,
}

impl SourceStamp {
    /// 读取源文件的 stamp，文件不存在返回 None
    pub fn read(path: &Path) -> Option<Self> {
        let metadata = std::fs::metadata(path).ok()?;
        if !metadata.is_file() {
            return None;
        }
        let modified = metadata.modified().ok()?;
        Some(Self {
            path: path.to_path_buf(),
            modified_nanos: nanos_since_epoch(modified),
            size: metadata.len(),
        })
    }

    pub fn from_parts(path: impl Into<PathBuf>, modified: SystemTime, size: u64) -> Self {
        Self {
            path: path.into(),
            modified_nanos: nanos_since_epoch(modified),
            size,
        }
    }
}

fn nanos_since_epoch(time: SystemTime) -> u128 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0)
}

/// 派生产物的参数部分（如页码/DPI/格式/质量）与文件扩展名
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactKey {
    pub params: String,
    pub extension: String,
}

impl ArtifactKey {
    pub fn new(params: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            params: params.into(),
            extension: extension.into(),
        }
    }
}

/// 完整缓存 key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    pub stamp: SourceStamp,
    pub cache_type: CacheType,
    pub artifact: ArtifactKey,
}

impl CacheKey {
    pub fn new(stamp: SourceStamp, cache_type: CacheType, artifact: ArtifactKey) -> Self {
        Self {
            stamp,
            cache_type,
            artifact,
        }
    }

    /// md5(path|mtime|cache_type|params)
    pub fn digest(&self) -> String {
        let material = format!(
            "{}|{}|{}|{}",
            self.stamp.path.to_string_lossy(),
            self.stamp.modified_nanos,
            self.cache_type.as_str(),
            self.artifact.params
        );
        format!("{:x}", md5::compute(material.as_bytes()))
    }

    /// 相对缓存类型根目录的路径：`<2hex>/<digest>.<ext>`
    pub fn relative_path(&self) -> PathBuf {
        let digest = self.digest();
        let file_name = if self.artifact.extension.is_empty() {
            digest.clone()
        } else {
            format!("{}.{}", digest, self.artifact.extension)
        };
        PathBuf::from(&digest[..2]).join(file_name)
    }
}

/// 路径字符串的 md5（不读取文件内容）
pub fn path_digest(path: &Path) -> String {
    format!("{:x}", md5::compute(path.to_string_lossy().as_bytes()))
}
