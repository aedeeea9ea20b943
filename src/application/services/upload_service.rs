//! Chunked Upload Service - 大文件分块上传
//!
//! 分块写入 `<temp_dir>/<upload_id>/chunk_<i>`，收齐后按序合并到
//! `<upload_dir>/<upload_id><ext>`

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::application::error::ApplicationError;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Invalid upload id: {0}")]
    InvalidUploadId(String),

    #[error("Invalid chunk: {0}")]
    InvalidChunk(String),

    #[error("Chunk too large: {size} bytes (max {max})")]
    ChunkTooLarge { size: u64, max: u64 },

    #[error("Missing chunk {0}")]
    MissingChunk(u32),

    #[error("IO error: {0}")]
    IoError(String),
}

impl From<std::io::Error> for UploadError {
    fn from(err: std::io::Error) -> Self {
        UploadError::IoError(err.to_string())
    }
}

impl From<UploadError> for ApplicationError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::IoError(msg) => ApplicationError::StorageError(msg),
            UploadError::MissingChunk(_) => ApplicationError::InternalError(err.to_string()),
            other => ApplicationError::ValidationError(other.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChunkedUploadConfig {
    /// 分块临时目录
    pub temp_dir: PathBuf,
    /// 合并后的文件目录
    pub upload_dir: PathBuf,
    /// 单个分块大小上限（字节）
    pub max_chunk_bytes: u64,
}

/// 一个上传分块
#[derive(Debug, Clone, Copy)]
pub struct UploadChunk<'a> {
    pub upload_id: &'a str,
    pub file_name: &'a str,
    pub chunk_index: u32,
    pub total_chunks: u32,
    pub data: &'a [u8],
}

/// 上传进度
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UploadProgress {
    Progress {
        received_chunks: u32,
        total_chunks: u32,
    },
    Complete {
        file_name: String,
        file_path: PathBuf,
        md5: String,
    },
}

pub struct ChunkedUploadService {
    config: ChunkedUploadConfig,
    /// upload_id -> 同一上传的分块串行处理
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl ChunkedUploadService {
    pub fn new(config: ChunkedUploadConfig) -> Result<Self, UploadError> {
        std::fs::create_dir_all(&config.temp_dir)?;
        std::fs::create_dir_all(&config.upload_dir)?;
        Ok(Self {
            config,
            locks: DashMap::new(),
        })
    }

    pub fn upload_dir(&self) -> &Path {
        &self.config.upload_dir
    }

    fn validate(&self, chunk: &UploadChunk<'_>) -> Result<String, UploadError> {
        let id = uuid::Uuid::parse_str(chunk.upload_id)
            .map_err(|_| UploadError::InvalidUploadId(chunk.upload_id.to_string()))?;

        if chunk.file_name.trim().is_empty() {
            return Err(UploadError::InvalidChunk("fileName is required".into()));
        }
        if chunk.total_chunks == 0 {
            return Err(UploadError::InvalidChunk("totalChunks must be at least 1".into()));
        }
        if chunk.chunk_index >= chunk.total_chunks {
            return Err(UploadError::InvalidChunk(format!(
                "chunkIndex {} out of range (totalChunks {})",
                chunk.chunk_index, chunk.total_chunks
            )));
        }
        let size = chunk.data.len() as u64;
        if size > self.config.max_chunk_bytes {
            return Err(UploadError::ChunkTooLarge {
                size,
                max: self.config.max_chunk_bytes,
            });
        }
        Ok(id.hyphenated().to_string())
    }

    /// 保存一个分块，收齐后合并
    pub fn accept_chunk(&self, chunk: UploadChunk<'_>) -> Result<UploadProgress, UploadError> {
        let upload_id = self.validate(&chunk)?;

        let lock = self
            .locks
            .entry(upload_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let result = {
            let _guard = lock.lock();
            self.store_chunk(&upload_id, &chunk)
        };

        // 无其他请求持有时移除锁条目，中途放弃的上传不会残留
        self.locks
            .remove_if(&upload_id, |_, entry| Arc::ptr_eq(entry, &lock) && Arc::strong_count(entry) == 2);
        result
    }

    fn store_chunk(&self, upload_id: &str, chunk: &UploadChunk<'_>) -> Result<UploadProgress, UploadError> {
        let chunk_dir = self.config.temp_dir.join(upload_id);
        std::fs::create_dir_all(&chunk_dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&chunk_dir)?;
        tmp.write_all(chunk.data)?;
        tmp.persist(chunk_dir.join(format!("chunk_{}", chunk.chunk_index)))
            .map_err(|e| UploadError::IoError(e.to_string()))?;

        let received = count_chunks(&chunk_dir, chunk.total_chunks)?;
        tracing::info!(
            upload_id = %upload_id,
            chunk = chunk.chunk_index + 1,
            total = chunk.total_chunks,
            file_name = %chunk.file_name,
            "Upload chunk received"
        );

        if received < chunk.total_chunks {
            return Ok(UploadProgress::Progress {
                received_chunks: received,
                total_chunks: chunk.total_chunks,
            });
        }

        self.assemble(upload_id, &chunk_dir, chunk.file_name, chunk.total_chunks)
    }

    fn assemble(
        &self,
        upload_id: &str,
        chunk_dir: &Path,
        file_name: &str,
        total_chunks: u32,
    ) -> Result<UploadProgress, UploadError> {
        let final_path = self
            .config
            .upload_dir
            .join(format!("{}{}", upload_id, safe_extension(file_name)));

        let mut out = tempfile::NamedTempFile::new_in(&self.config.upload_dir)?;
        let mut context = md5::Context::new();
        for index in 0..total_chunks {
            let part = chunk_dir.join(format!("chunk_{}", index));
            let data = std::fs::read(&part).map_err(|_| UploadError::MissingChunk(index))?;
            context.consume(&data);
            out.write_all(&data)?;
        }
        out.persist(&final_path)
            .map_err(|e| UploadError::IoError(e.to_string()))?;

        if let Err(e) = std::fs::remove_dir_all(chunk_dir) {
            tracing::warn!(upload_id = %upload_id, error = %e, "Failed to remove chunk directory");
        }

        let md5 = format!("{:x}", context.compute());
        tracing::info!(
            upload_id = %upload_id,
            file = %final_path.display(),
            md5 = %md5,
            "Upload assembled"
        );

        Ok(UploadProgress::Complete {
            file_name: file_name.to_string(),
            file_path: final_path,
            md5,
        })
    }
}

fn count_chunks(dir: &Path, total_chunks: u32) -> Result<u32, UploadError> {
    let mut count = 0;
    for entry in std::fs::read_dir(dir)? {
        let name = entry?.file_name();
        let index = name
            .to_str()
            .and_then(|n| n.strip_prefix("chunk_"))
            .and_then(|n| n.parse::<u32>().ok());
        if matches!(index, Some(i) if i < total_chunks) {
            count += 1;
        }
    }
    Ok(count)
}

/// 原文件名的扩展名（含点），只接受短的字母数字扩展名
fn safe_extension(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 10 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| format!(".{}", e.to_lowercase()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{tempdir, TempDir};

    const ID: &str = "6f1c9a3e-2b4d-4e8f-9a1b-3c5d7e9f1a2b";

    fn service(dir: &TempDir) -> ChunkedUploadService {
        ChunkedUploadService::new(ChunkedUploadConfig {
            temp_dir: dir.path().join("temp"),
            upload_dir: dir.path().join("uploads"),
            max_chunk_bytes: 1024,
        })
        .unwrap()
    }

    fn chunk<'a>(index: u32, total: u32, data: &'a [u8]) -> UploadChunk<'a> {
        UploadChunk {
            upload_id: ID,
            file_name: "Volume 1.PDF",
            chunk_index: index,
            total_chunks: total,
            data,
        }
    }

    #[test]
    fn test_out_of_order_chunks_assemble_in_index_order() {
        let dir = tempdir().unwrap();
        let service = service(&dir);

        assert_eq!(
            service.accept_chunk(chunk(2, 3, b"cc")).unwrap(),
            UploadProgress::Progress {
                received_chunks: 1,
                total_chunks: 3
            }
        );
        service.accept_chunk(chunk(0, 3, b"aa")).unwrap();
        // 重传同一分块不重复计数
        assert_eq!(
            service.accept_chunk(chunk(0, 3, b"aa")).unwrap(),
            UploadProgress::Progress {
                received_chunks: 2,
                total_chunks: 3
            }
        );

        match service.accept_chunk(chunk(1, 3, b"bb")).unwrap() {
            UploadProgress::Complete {
                file_name,
                file_path,
                md5,
            } => {
                assert_eq!(file_name, "Volume 1.PDF");
                assert_eq!(file_path, dir.path().join("uploads").join(format!("{}.pdf", ID)));
                assert_eq!(std::fs::read(&file_path).unwrap(), b"aabbcc");
                assert_eq!(md5, format!("{:x}", md5::compute(b"aabbcc")));
            }
            other => panic!("unexpected progress: {:?}", other),
        }
        assert!(!dir.path().join("temp").join(ID).exists());
    }

    #[test]
    fn test_single_chunk_upload() {
        let dir = tempdir().unwrap();
        let service = service(&dir);
        assert!(matches!(
            service.accept_chunk(chunk(0, 1, b"whole")).unwrap(),
            UploadProgress::Complete { .. }
        ));
    }

    #[test]
    fn test_rejects_invalid_chunks() {
        let dir = tempdir().unwrap();
        let service = service(&dir);

        let mut bad_id = chunk(0, 1, b"x");
        bad_id.upload_id = "../../etc";
        assert!(matches!(
            service.accept_chunk(bad_id),
            Err(UploadError::InvalidUploadId(_))
        ));
        assert!(matches!(
            service.accept_chunk(chunk(3, 3, b"x")),
            Err(UploadError::InvalidChunk(_))
        ));
        assert!(matches!(
            service.accept_chunk(chunk(0, 0, b"x")),
            Err(UploadError::InvalidChunk(_))
        ));
        let big = vec![0u8; 2048];
        assert!(matches!(
            service.accept_chunk(chunk(0, 1, &big)),
            Err(UploadError::ChunkTooLarge { size: 2048, max: 1024 })
        ));
    }

    #[test]
    fn test_lock_entries_do_not_outlive_requests() {
        let dir = tempdir().unwrap();
        let service = service(&dir);

        // 只收到部分分块的上传
        service.accept_chunk(chunk(0, 3, b"aa")).unwrap();
        assert!(service.locks.is_empty());

        let big = vec![0u8; 2048];
        assert!(service.accept_chunk(chunk(1, 3, &big)).is_err());
        assert!(service.locks.is_empty());

        // 之后仍可继续同一上传
        service.accept_chunk(chunk(1, 3, b"bb")).unwrap();
        assert!(matches!(
            service.accept_chunk(chunk(2, 3, b"cc")).unwrap(),
            UploadProgress::Complete { .. }
        ));
        assert!(service.locks.is_empty());
    }

    #[test]
    fn test_concurrent_chunks_assemble_once() {
        let dir = tempdir().unwrap();
        let service = Arc::new(service(&dir));
        let parts: Vec<Vec<u8>> = (0..8u8).map(|i| vec![b'a' + i; 16]).collect();

        let handles: Vec<_> = (0..8u32)
            .map(|i| {
                let service = service.clone();
                let data = parts[i as usize].clone();
                std::thread::spawn(move || service.accept_chunk(chunk(i, 8, &data)).unwrap())
            })
            .collect();
        let completed = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|p| matches!(p, UploadProgress::Complete { .. }))
            .count();

        assert_eq!(completed, 1);
        assert!(service.locks.is_empty());
        let path = dir.path().join("uploads").join(format!("{}.pdf", ID));
        assert_eq!(std::fs::read(path).unwrap(), parts.concat());
    }

    #[test]
    fn test_safe_extension() {
        assert_eq!(safe_extension("a.Mp3"), ".mp3");
        assert_eq!(safe_extension("noext"), "");
        assert_eq!(safe_extension("a.p/df"), "");
        assert_eq!(safe_extension("a.verylongextension"), "");
    }
}
