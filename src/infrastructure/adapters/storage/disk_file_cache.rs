//! Disk File Cache - 文件系统内容寻址缓存
//!
//! 实现 FileCachePort trait
//!
//! 目录布局：`<root>/<type>_cache/<2hex>/<md5>.<ext>`，标记文件
//! `<md5>_markers.json` 与缓存文件共用 `audio_cache/` 目录

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::application::ports::{
    hash_file, CachePayload, CacheRootStats, EvictionPolicy, FileCacheError, FileCachePort,
    SweepReport,
};
use crate::domain::cache::{ArtifactKey, CacheKey, CacheType, SourceStamp};

const MARKERS_SUFFIX: &str = "_markers.json";
const CACHE_DIR_SUFFIX: &str = "_cache";

/// 缓存目录中的文件
struct CachedFile {
    path: PathBuf,
    size: u64,
    modified: SystemTime,
}

/// 文件系统缓存
pub struct DiskFileCache {
    /// 缓存根目录
    root: PathBuf,
}

impl DiskFileCache {
    /// 创建缓存，确保内置缓存目录存在
    pub fn new(root: impl AsRef<Path>) -> Result<Self, FileCacheError> {
        let root = root.as_ref().to_path_buf();
        for cache_type in CacheType::builtin() {
            fs::create_dir_all(root.join(cache_type.dir_name()))?;
        }

        tracing::info!(root = %root.display(), "DiskFileCache initialized");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 根目录下所有 `*_cache` 目录
    fn cache_dirs(&self) -> Vec<(String, PathBuf)> {
        let Ok(entries) = fs::read_dir(&self.root) else {
            return Vec::new();
        };
        let mut dirs: Vec<(String, PathBuf)> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir())
            .filter_map(|e| {
                let name = e.file_name().to_string_lossy().to_string();
                name.strip_suffix(CACHE_DIR_SUFFIX)
                    .map(|t| (t.to_string(), e.path()))
            })
            .collect();
        dirs.sort();
        dirs
    }

    /// 原子写入：临时文件 + rename
    fn write_atomic(target: &Path, bytes: &[u8]) -> Result<(), FileCacheError> {
        let parent = target
            .parent()
            .ok_or_else(|| FileCacheError::IoError(format!("No parent for {}", target.display())))?;
        fs::create_dir_all(parent)?;

        let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
        tmp.write_all(bytes)?;
        tmp.persist(target).map_err(|e| FileCacheError::IoError(e.error.to_string()))?;
        Ok(())
    }

    /// 删除目录内容，返回删除的文件数
    fn wipe_dir(dir: &Path) -> Result<u64, FileCacheError> {
        if !dir.exists() {
            return Ok(0);
        }
        let count = collect_files(dir).len() as u64;
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                fs::remove_dir_all(&path)?;
            } else {
                fs::remove_file(&path)?;
            }
        }
        Ok(count)
    }
}

impl FileCachePort for DiskFileCache {
    fn file_hash(&self, path: &Path) -> Option<String> {
        hash_file(path)
    }

    fn root_dir(&self, cache_type: &CacheType) -> PathBuf {
        self.root.join(cache_type.dir_name())
    }

    fn cache_path(
        &self,
        source: &Path,
        cache_type: &CacheType,
        artifact: &ArtifactKey,
    ) -> Option<PathBuf> {
        let stamp = SourceStamp::read(source)?;
        let key = CacheKey::new(stamp, cache_type.clone(), artifact.clone());
        Some(self.root_dir(cache_type).join(key.relative_path()))
    }

    fn cached_file(
        &self,
        source: &Path,
        cache_type: &CacheType,
        artifact: &ArtifactKey,
    ) -> Option<PathBuf> {
        self.cache_path(source, cache_type, artifact)
            .filter(|p| p.is_file())
    }

    fn read(&self, cached: &Path) -> Result<Vec<u8>, FileCacheError> {
        let bytes = fs::read(cached)?;

        // LRU touch
        if let Ok(file) = fs::File::options().write(true).open(cached) {
            let _ = file.set_modified(SystemTime::now());
        }

        Ok(bytes)
    }

    fn save(
        &self,
        source: &Path,
        cache_type: &CacheType,
        artifact: &ArtifactKey,
        payload: CachePayload,
    ) -> Result<PathBuf, FileCacheError> {
        let target = self
            .cache_path(source, cache_type, artifact)
            .ok_or_else(|| FileCacheError::SourceNotFound(source.display().to_string()))?;
        let bytes = payload.into_bytes()?;

        Self::write_atomic(&target, &bytes)?;

        tracing::debug!(
            cache_path = %target.display(),
            size_bytes = bytes.len(),
            "Artifact cached"
        );
        Ok(target)
    }

    fn clear(&self, cache_type: Option<&CacheType>) -> Result<u64, FileCacheError> {
        let dirs: Vec<PathBuf> = match cache_type {
            Some(t) => vec![self.root_dir(t)],
            None => self.cache_dirs().into_iter().map(|(_, p)| p).collect(),
        };

        let mut removed = 0;
        for dir in dirs {
            removed += Self::wipe_dir(&dir)?;
        }

        tracing::info!(
            cache_type = cache_type.map(|t| t.as_str()).unwrap_or("all"),
            removed_files = removed,
            "Cache cleared"
        );
        Ok(removed)
    }

    fn stats(&self) -> Vec<CacheRootStats> {
        self.cache_dirs()
            .into_iter()
            .map(|(name, dir)| {
                let files = collect_files(&dir);
                CacheRootStats {
                    cache_type: name,
                    entries: files.len() as u64,
                    total_bytes: files.iter().map(|f| f.size).sum(),
                }
            })
            .collect()
    }

    fn sweep(&self, policy: &EvictionPolicy) -> Result<SweepReport, FileCacheError> {
        let now = SystemTime::now();
        let mut report = SweepReport::default();

        let mut files: Vec<CachedFile> = self
            .cache_dirs()
            .iter()
            .flat_map(|(_, dir)| collect_files(dir))
            .filter(|f| is_evictable(&f.path))
            .collect();

        if let Some(max_age) = policy.max_age {
            let mut kept = Vec::with_capacity(files.len());
            for file in files {
                let age = now.duration_since(file.modified).unwrap_or_default();
                if age > max_age {
                    remove_cached(&file, &mut report)?;
                    report.expired_files += 1;
                } else {
                    kept.push(file);
                }
            }
            files = kept;
        }

        let mut total: u64 = files.iter().map(|f| f.size).sum();
        if let Some(max_bytes) = policy.max_bytes {
            // 最久未访问的优先删除
            files.sort_by_key(|f| f.modified);
            let mut iter = files.into_iter();
            while total > max_bytes {
                let Some(file) = iter.next() else { break };
                remove_cached(&file, &mut report)?;
                report.evicted_files += 1;
                total -= file.size;
            }
        }
        report.remaining_bytes = total;

        if report.expired_files + report.evicted_files > 0 {
            tracing::info!(
                expired = report.expired_files,
                evicted = report.evicted_files,
                freed_bytes = report.freed_bytes,
                remaining_bytes = report.remaining_bytes,
                "Cache sweep finished"
            );
        }
        Ok(report)
    }
}

/// 标记文件与写入中的临时文件不参与淘汰
fn is_evictable(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    !name.ends_with(MARKERS_SUFFIX) && !name.starts_with(".tmp")
}

fn remove_cached(file: &CachedFile, report: &mut SweepReport) -> Result<(), FileCacheError> {
    match fs::remove_file(&file.path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    }
    report.freed_bytes += file.size;

    // 清理空的分片目录
    if let Some(parent) = file.path.parent() {
        let _ = fs::remove_dir(parent);
    }
    Ok(())
}

/// 递归列出目录下的文件
fn collect_files(dir: &Path) -> Vec<CachedFile> {
    let mut files = Vec::new();
    let mut stack = vec![dir.to_path_buf()];

    while let Some(current) = stack.pop() {
        let Ok(entries) = fs::read_dir(&current) else {
            continue;
        };
        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path();
            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            if metadata.is_dir() {
                stack.push(path);
            } else if metadata.is_file() {
                files.push(CachedFile {
                    path,
                    size: metadata.len(),
                    modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                });
            }
        }
    }

    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::tempdir;

    fn setup() -> (tempfile::TempDir, DiskFileCache, PathBuf) {
        let dir = tempdir().unwrap();
        let cache = DiskFileCache::new(dir.path().join("cache")).unwrap();
        let source = dir.path().join("book.pdf");
        fs::write(&source, b"pdf bytes").unwrap();
        (dir, cache, source)
    }

    fn set_mtime(path: &Path, time: SystemTime) {
        let file = fs::File::options().write(true).open(path).unwrap();
        file.set_modified(time).unwrap();
    }

    #[test]
    fn test_missing_source_has_no_cache_path() {
        let (dir, cache, _) = setup();
        let missing = dir.path().join("missing.pdf");
        let artifact = ArtifactKey::new("page1", "jpg");
        assert!(cache.cache_path(&missing, &CacheType::Pdf, &artifact).is_none());
        assert!(matches!(
            cache.save(&missing, &CacheType::Pdf, &artifact, CachePayload::Bytes(vec![1])),
            Err(FileCacheError::SourceNotFound(_))
        ));
    }

    #[test]
    fn test_save_and_lookup() {
        let (_dir, cache, source) = setup();
        let artifact = ArtifactKey::new("page1_200dpi_jpeg_q85", "jpg");

        assert!(cache.cached_file(&source, &CacheType::Pdf, &artifact).is_none());

        let saved = cache
            .save(&source, &CacheType::Pdf, &artifact, CachePayload::Bytes(vec![9, 9, 9]))
            .unwrap();
        let found = cache.cached_file(&source, &CacheType::Pdf, &artifact).unwrap();
        assert_eq!(saved, found);
        assert!(saved.starts_with(cache.root().join("pdf_cache")));
        assert_eq!(cache.read(&found).unwrap(), vec![9, 9, 9]);
    }

    #[test]
    fn test_json_and_text_payloads() {
        let (_dir, cache, source) = setup();
        let json = ArtifactKey::new("info", "json");
        let path = cache
            .save(
                &source,
                &CacheType::Custom("meta".into()),
                &json,
                CachePayload::Json(serde_json::json!({"pages": 3})),
            )
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(value["pages"], 3);
        assert!(path.starts_with(cache.root().join("meta_cache")));

        let text = ArtifactKey::new("text", "txt");
        let path = cache
            .save(&source, &CacheType::Pdf, &text, CachePayload::Text("hello".into()))
            .unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "hello");
    }

    #[test]
    fn test_mtime_change_orphans_entry() {
        let (_dir, cache, source) = setup();
        let artifact = ArtifactKey::new("page1", "jpg");
        cache
            .save(&source, &CacheType::Pdf, &artifact, CachePayload::Bytes(vec![1]))
            .unwrap();

        set_mtime(&source, SystemTime::now() + Duration::from_secs(30));
        assert!(cache.cached_file(&source, &CacheType::Pdf, &artifact).is_none());
    }

    #[test]
    fn test_clear_by_type_and_all() {
        let (_dir, cache, source) = setup();
        let artifact = ArtifactKey::new("a", "bin");
        cache
            .save(&source, &CacheType::Pdf, &artifact, CachePayload::Bytes(vec![1]))
            .unwrap();
        cache
            .save(&source, &CacheType::Audio, &artifact, CachePayload::Bytes(vec![2]))
            .unwrap();

        assert_eq!(cache.clear(Some(&CacheType::Pdf)).unwrap(), 1);
        assert!(cache.cached_file(&source, &CacheType::Pdf, &artifact).is_none());
        assert!(cache.cached_file(&source, &CacheType::Audio, &artifact).is_some());

        assert_eq!(cache.clear(None).unwrap(), 1);
        assert!(cache.cached_file(&source, &CacheType::Audio, &artifact).is_none());
        assert!(cache.root_dir(&CacheType::Pdf).exists());
    }

    #[test]
    fn test_stats() {
        let (_dir, cache, source) = setup();
        cache
            .save(&source, &CacheType::Pdf, &ArtifactKey::new("a", "bin"), CachePayload::Bytes(vec![0; 10]))
            .unwrap();
        cache
            .save(&source, &CacheType::Pdf, &ArtifactKey::new("b", "bin"), CachePayload::Bytes(vec![0; 5]))
            .unwrap();

        let stats = cache.stats();
        let pdf = stats.iter().find(|s| s.cache_type == "pdf").unwrap();
        assert_eq!(pdf.entries, 2);
        assert_eq!(pdf.total_bytes, 15);
        let audio = stats.iter().find(|s| s.cache_type == "audio").unwrap();
        assert_eq!(audio.entries, 0);
    }

    #[test]
    fn test_sweep_expires_old_entries_and_keeps_markers() {
        let (_dir, cache, source) = setup();
        let old = cache
            .save(&source, &CacheType::Pdf, &ArtifactKey::new("old", "bin"), CachePayload::Bytes(vec![0; 4]))
            .unwrap();
        let fresh = cache
            .save(&source, &CacheType::Pdf, &ArtifactKey::new("new", "bin"), CachePayload::Bytes(vec![0; 4]))
            .unwrap();
        let markers = cache.root_dir(&CacheType::Audio).join("abc_markers.json");
        fs::write(&markers, b"[]").unwrap();

        let long_ago = SystemTime::now() - Duration::from_secs(7200);
        set_mtime(&old, long_ago);
        set_mtime(&markers, long_ago);

        let report = cache
            .sweep(&EvictionPolicy {
                max_age: Some(Duration::from_secs(3600)),
                max_bytes: None,
            })
            .unwrap();

        assert_eq!(report.expired_files, 1);
        assert_eq!(report.freed_bytes, 4);
        assert!(!old.exists());
        assert!(fresh.exists());
        assert!(markers.exists());
    }

    #[test]
    fn test_sweep_evicts_least_recently_used_over_cap() {
        let (_dir, cache, source) = setup();
        let now = SystemTime::now();
        let mut paths = Vec::new();
        for (i, age) in [300u64, 200, 100].iter().enumerate() {
            let p = cache
                .save(
                    &source,
                    &CacheType::Pdf,
                    &ArtifactKey::new(format!("p{}", i), "bin"),
                    CachePayload::Bytes(vec![0; 10]),
                )
                .unwrap();
            set_mtime(&p, now - Duration::from_secs(*age));
            paths.push(p);
        }

        // 读取会刷新访问时间，最旧的条目因此保留
        cache.read(&paths[0]).unwrap();

        let report = cache
            .sweep(&EvictionPolicy {
                max_age: None,
                max_bytes: Some(20),
            })
            .unwrap();

        assert_eq!(report.evicted_files, 1);
        assert_eq!(report.remaining_bytes, 20);
        assert!(paths[0].exists());
        assert!(!paths[1].exists());
        assert!(paths[2].exists());
    }
}
