//! Audio Service - 音频信息、范围流、时间轴标记与分块读取

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use super::pdf_service::file_name_of;
use crate::application::error::ApplicationError;
use crate::application::ports::{
    get_json, put_json, AudioProbePort, AudioTags, FileCachePort, KeyValueCachePort,
};
use crate::domain::audio::{
    mime_type_for, speed_header_value, validate_markers, validate_speed, AudioInfo, AudioMarker,
    ByteRange, ChunkLayout,
};
use crate::domain::cache::{path_digest, CacheType, SourceStamp};

/// Audio Service 配置
#[derive(Debug, Clone)]
pub struct AudioServiceConfig {
    /// 音频信息缓存时间
    pub info_ttl: Duration,
    /// 分块缓存时间
    pub chunk_ttl: Duration,
}

impl Default for AudioServiceConfig {
    fn default() -> Self {
        Self {
            info_ttl: Duration::from_secs(3600),
            chunk_ttl: Duration::from_secs(3600),
        }
    }
}

/// 已定位到起始偏移的音频流
#[derive(Debug)]
pub struct AudioStream {
    /// 已 seek 到 `range.start`（无范围时为 0）
    pub file: File,
    /// 请求了有效范围 (206)
    pub partial: bool,
    pub range: ByteRange,
    pub content_length: u64,
    pub file_size: u64,
    pub mime_type: &'static str,
    /// `X-Audio-Speed` 头值
    pub speed_header: Option<String>,
}

impl AudioStream {
    pub fn content_range(&self) -> Option<String> {
        self.partial
            .then(|| self.range.content_range(self.file_size))
    }
}

pub struct AudioService {
    file_cache: Arc<dyn FileCachePort>,
    kv_cache: Arc<dyn KeyValueCachePort>,
    probe: Arc<dyn AudioProbePort>,
    config: AudioServiceConfig,
}

impl AudioService {
    pub fn new(
        file_cache: Arc<dyn FileCachePort>,
        kv_cache: Arc<dyn KeyValueCachePort>,
        probe: Arc<dyn AudioProbePort>,
        config: AudioServiceConfig,
    ) -> Self {
        Self {
            file_cache,
            kv_cache,
            probe,
            config,
        }
    }

    /// 音频信息，探测失败时数值字段为 0
    pub fn get_audio_info(&self, path: &Path) -> Option<AudioInfo> {
        let stamp = SourceStamp::read(path)?;
        let key = format!("audio_{}_{}_info", path_digest(path), stamp.modified_nanos);

        if let Some(info) = get_json::<AudioInfo>(self.kv_cache.as_ref(), &key) {
            return Some(info);
        }

        let tags = self.probe.probe(path).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), error = %e, "Audio probe failed, using empty tags");
            AudioTags::default()
        });

        let info = AudioInfo {
            mime_type: mime_type_for(path).to_string(),
            file_size: stamp.size,
            duration: tags.duration,
            bitrate: tags.bitrate,
            sample_rate: tags.sample_rate,
            channels: tags.channels,
            metadata: tags.metadata,
            file_name: file_name_of(path),
        };
        put_json(self.kv_cache.as_ref(), &key, &info, self.config.info_ttl);
        Some(info)
    }

    /// 打开音频流
    ///
    /// - 文件不存在返回 `Ok(None)`
    /// - 无法识别的 Range 头按完整响应处理
    /// - 起点超出文件返回 `RangeNotSatisfiable`
    pub fn stream_audio(
        &self,
        path: &Path,
        range_header: Option<&str>,
        speed: f64,
    ) -> Result<Option<AudioStream>, ApplicationError> {
        let speed = validate_speed(speed)?;
        let Some(stamp) = SourceStamp::read(path) else {
            return Ok(None);
        };
        let file_size = stamp.size;

        let requested = match range_header {
            Some(header) => ByteRange::parse(header, file_size)?,
            None => None,
        };

        let mut file = File::open(path)?;
        let (range, partial) = match requested {
            Some(range) => {
                file.seek(SeekFrom::Start(range.start))?;
                (range, true)
            }
            None => (
                ByteRange {
                    start: 0,
                    end: file_size.saturating_sub(1),
                },
                false,
            ),
        };
        let content_length = if partial { range.len() } else { file_size };

        tracing::debug!(
            path = %path.display(),
            start = range.start,
            end = range.end,
            partial = partial,
            "Audio stream opened"
        );

        Ok(Some(AudioStream {
            file,
            partial,
            range,
            content_length,
            file_size,
            mime_type: mime_type_for(path),
            speed_header: speed_header_value(speed),
        }))
    }

    /// 标记文件路径：`<audio_cache>/<md5(path)>_markers.json`
    ///
    /// 以路径字符串为键，文件移动后标记丢失，原地覆盖后标记保留
    pub fn markers_path(&self, path: &Path) -> PathBuf {
        self.file_cache
            .root_dir(&CacheType::Audio)
            .join(format!("{}_markers.json", path_digest(path)))
    }

    /// 整体替换标记列表
    pub fn create_audio_markers(
        &self,
        path: &Path,
        markers: &[AudioMarker],
    ) -> Result<(), ApplicationError> {
        if !path.is_file() {
            return Err(ApplicationError::not_found(
                "Audio file",
                path.display().to_string(),
            ));
        }
        validate_markers(markers)?;

        let target = self.markers_path(path);
        let dir = target
            .parent()
            .ok_or_else(|| ApplicationError::internal("markers path has no parent"))?;
        std::fs::create_dir_all(dir)?;

        let data = serde_json::to_vec(markers)
            .map_err(|e| ApplicationError::internal(e.to_string()))?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&data)?;
        tmp.persist(&target)
            .map_err(|e| ApplicationError::StorageError(e.to_string()))?;

        tracing::info!(path = %path.display(), count = markers.len(), "Audio markers saved");
        Ok(())
    }

    /// 读取标记列表，不存在或无法解析时返回空列表
    pub fn get_audio_markers(&self, path: &Path) -> Vec<AudioMarker> {
        let target = self.markers_path(path);
        let data = match std::fs::read(&target) {
            Ok(d) => d,
            Err(_) => return Vec::new(),
        };
        serde_json::from_slice(&data).unwrap_or_else(|e| {
            tracing::warn!(markers = %target.display(), error = %e, "Ignoring unreadable markers file");
            Vec::new()
        })
    }

    /// 分块布局
    pub fn chunk_layout(
        &self,
        path: &Path,
        chunk_size: u64,
    ) -> Result<Option<ChunkLayout>, ApplicationError> {
        let Some(stamp) = SourceStamp::read(path) else {
            return Ok(None);
        };
        Ok(Some(ChunkLayout::new(stamp.size, chunk_size)?))
    }

    /// 读取单个分块
    ///
    /// 文件不存在、分块大小非法或索引越界时返回 None
    pub fn get_audio_chunk(&self, path: &Path, chunk_index: u64, chunk_size: u64) -> Option<Vec<u8>> {
        let stamp = SourceStamp::read(path)?;
        let layout = match ChunkLayout::new(stamp.size, chunk_size) {
            Ok(l) => l,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "Rejected chunk request");
                return None;
            }
        };
        let range = match layout.range_of(chunk_index) {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "Rejected chunk request");
                return None;
            }
        };

        let key = format!(
            "audio_chunk_{}_{}_{}_{}",
            path_digest(path),
            stamp.modified_nanos,
            chunk_size,
            chunk_index
        );
        match self.kv_cache.get(&key) {
            Ok(Some(bytes)) => {
                tracing::debug!(key = %key, "Audio chunk cache hit");
                return Some(bytes);
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(key = %key, error = %e, "KV cache read failed"),
        }

        let bytes = match read_range(path, range) {
            Ok(b) => b,
            Err(e) => {
                tracing::error!(path = %path.display(), chunk = chunk_index, error = %e, "Failed to read audio chunk");
                return None;
            }
        };

        if let Err(e) = self.kv_cache.put(&key, bytes.clone(), self.config.chunk_ttl) {
            tracing::warn!(key = %key, error = %e, "KV cache write failed");
        }
        Some(bytes)
    }
}

fn read_range(path: &Path, range: ByteRange) -> std::io::Result<Vec<u8>> {
    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(range.start))?;
    let mut buf = Vec::with_capacity(range.len() as usize);
    file.take(range.len()).read_to_end(&mut buf)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::testing::{FakeAudioProbe, MemoryKvCache};
    use crate::infrastructure::adapters::DiskFileCache;
    use std::collections::BTreeMap;
    use tempfile::{tempdir, TempDir};

    const SIZE: usize = 5 * 1024 * 1024;

    fn sample_bytes(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 253) as u8).collect()
    }

    fn build_service(dir: &TempDir, tags: Option<AudioTags>) -> (AudioService, Arc<MemoryKvCache>) {
        let kv = Arc::new(MemoryKvCache::default());
        let cache = Arc::new(DiskFileCache::new(dir.path().join("cache")).unwrap());
        let service = AudioService::new(
            cache,
            kv.clone(),
            Arc::new(FakeAudioProbe { tags }),
            AudioServiceConfig::default(),
        );
        (service, kv)
    }

    fn write_audio(dir: &TempDir, name: &str, data: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, data).unwrap();
        path
    }

    fn drain(stream: AudioStream) -> Vec<u8> {
        let len = stream.content_length;
        let mut buf = Vec::new();
        stream.file.take(len).read_to_end(&mut buf).unwrap();
        buf
    }

    #[test]
    fn test_full_stream_without_range() {
        let dir = tempdir().unwrap();
        let (service, _) = build_service(&dir, None);
        let path = write_audio(&dir, "book.mp3", &sample_bytes(SIZE));

        let stream = service.stream_audio(&path, None, 1.0).unwrap().unwrap();
        assert!(!stream.partial);
        assert_eq!(stream.content_length, 5_242_880);
        assert_eq!(stream.mime_type, "audio/mpeg");
        assert_eq!(stream.content_range(), None);
        assert_eq!(stream.speed_header, None);
    }

    #[test]
    fn test_open_ended_range() {
        let dir = tempdir().unwrap();
        let (service, _) = build_service(&dir, None);
        let data = sample_bytes(SIZE);
        let path = write_audio(&dir, "book.mp3", &data);

        let stream = service
            .stream_audio(&path, Some("bytes=5000000-"), 1.5)
            .unwrap()
            .unwrap();
        assert!(stream.partial);
        assert_eq!(stream.content_length, 242_880);
        assert_eq!(
            stream.content_range().as_deref(),
            Some("bytes 5000000-5242879/5242880")
        );
        assert_eq!(stream.speed_header.as_deref(), Some("1.5"));
        assert_eq!(drain(stream), data[5_000_000..].to_vec());
    }

    #[test]
    fn test_closed_range_returns_exact_slice() {
        let dir = tempdir().unwrap();
        let (service, _) = build_service(&dir, None);
        let data = sample_bytes(4096);
        let path = write_audio(&dir, "a.ogg", &data);

        let stream = service
            .stream_audio(&path, Some("bytes=100-199"), 1.0)
            .unwrap()
            .unwrap();
        assert_eq!(stream.content_range().as_deref(), Some("bytes 100-199/4096"));
        let body = drain(stream);
        assert_eq!(body.len(), 100);
        assert_eq!(body, data[100..200].to_vec());
    }

    #[test]
    fn test_stream_errors() {
        let dir = tempdir().unwrap();
        let (service, _) = build_service(&dir, None);
        let path = write_audio(&dir, "a.wav", &sample_bytes(1000));

        assert!(service
            .stream_audio(&dir.path().join("missing.mp3"), None, 1.0)
            .unwrap()
            .is_none());
        assert!(matches!(
            service.stream_audio(&path, Some("bytes=1000-"), 1.0),
            Err(ApplicationError::RangeNotSatisfiable(_))
        ));
        assert!(matches!(
            service.stream_audio(&path, None, 0.0),
            Err(ApplicationError::ValidationError(_))
        ));
        // 无法识别的范围按完整响应处理
        let stream = service.stream_audio(&path, Some("items=1-2"), 1.0).unwrap().unwrap();
        assert!(!stream.partial);
    }

    #[test]
    fn test_audio_info_with_and_without_tags() {
        let dir = tempdir().unwrap();
        let path = write_audio(&dir, "book.flac", &sample_bytes(2048));

        let mut metadata = BTreeMap::new();
        metadata.insert("title".to_string(), "Chapter 1".to_string());
        let tags = AudioTags {
            duration: 12.5,
            bitrate: 128_000,
            sample_rate: 44_100,
            channels: 2,
            metadata,
        };
        let (service, kv) = build_service(&dir, Some(tags));
        let info = service.get_audio_info(&path).unwrap();
        assert_eq!(info.mime_type, "audio/flac");
        assert_eq!(info.file_size, 2048);
        assert_eq!(info.duration, 12.5);
        assert_eq!(info.file_name, "book.flac");
        assert_eq!(kv.stats().total_entries, 1);

        let other = tempdir().unwrap();
        let (bare, _) = build_service(&other, None);
        let info = bare.get_audio_info(&path).unwrap();
        assert_eq!(info.duration, 0.0);
        assert_eq!(info.bitrate, 0);
        assert!(bare.get_audio_info(&dir.path().join("none.mp3")).is_none());
    }

    #[test]
    fn test_markers_roundtrip_and_replace() {
        let dir = tempdir().unwrap();
        let (service, _) = build_service(&dir, None);
        let path = write_audio(&dir, "book.mp3", &sample_bytes(10));

        assert!(service.get_audio_markers(&path).is_empty());

        let first = vec![
            AudioMarker { time: 1.0, label: "intro".into() },
            AudioMarker { time: 61.5, label: "chapter 1".into() },
        ];
        service.create_audio_markers(&path, &first).unwrap();
        assert_eq!(service.get_audio_markers(&path), first);

        let second = vec![AudioMarker { time: 5.0, label: "only".into() }];
        service.create_audio_markers(&path, &second).unwrap();
        assert_eq!(service.get_audio_markers(&path), second);

        let marker_file = service.markers_path(&path);
        assert!(marker_file.starts_with(dir.path().join("cache").join("audio_cache")));
        assert!(marker_file.to_string_lossy().ends_with("_markers.json"));

        let invalid = vec![AudioMarker { time: -1.0, label: "bad".into() }];
        assert!(matches!(
            service.create_audio_markers(&path, &invalid),
            Err(ApplicationError::ValidationError(_))
        ));
        assert!(matches!(
            service.create_audio_markers(&dir.path().join("x.mp3"), &second),
            Err(ApplicationError::NotFound { .. })
        ));
    }

    #[test]
    fn test_chunks() {
        let dir = tempdir().unwrap();
        let (service, kv) = build_service(&dir, None);
        let data = sample_bytes(2500);
        let path = write_audio(&dir, "book.mp3", &data);

        let layout = service.chunk_layout(&path, 1000).unwrap().unwrap();
        assert_eq!(layout.num_chunks, 3);

        assert_eq!(service.get_audio_chunk(&path, 0, 1000).unwrap(), data[..1000].to_vec());
        assert_eq!(service.get_audio_chunk(&path, 2, 1000).unwrap(), data[2000..].to_vec());
        assert!(service.get_audio_chunk(&path, 3, 1000).is_none());
        assert!(service.get_audio_chunk(&path, 0, 0).is_none());
        assert_eq!(kv.stats().total_entries, 2);

        // 命中缓存
        assert_eq!(service.get_audio_chunk(&path, 0, 1000).unwrap(), data[..1000].to_vec());
        assert!(service.chunk_layout(&dir.path().join("none.mp3"), 1000).unwrap().is_none());
    }
}
