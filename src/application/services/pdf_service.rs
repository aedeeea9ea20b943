//! PDF Service - 页面信息、文本、图片与目录
//!
//! 所有方法在预期失败（文件缺失、页码越界、依赖不可用）时返回 None，
//! 由 HTTP 层渲染为结构化错误

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use super::single_flight::SingleFlight;
use crate::application::ports::{
    get_json, put_json, CachePayload, FileCachePort, KeyValueCachePort, PdfReaderPort,
    RasterizerPort,
};
use crate::domain::cache::{path_digest, ArtifactKey, CacheType, SourceStamp};
use crate::domain::pdf::{
    check_page_number, flatten_outline, PdfInfo, PdfStructure, RenderOptions,
};

/// PDF Service 配置
#[derive(Debug, Clone)]
pub struct PdfServiceConfig {
    /// 页面文本缓存时间
    pub text_ttl: Duration,
    /// 文档信息缓存时间
    pub info_ttl: Duration,
}

impl Default for PdfServiceConfig {
    fn default() -> Self {
        Self {
            text_ttl: Duration::from_secs(3600),
            info_ttl: Duration::from_secs(3600),
        }
    }
}

/// 渲染后的页面
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPage {
    pub bytes: Vec<u8>,
    pub cache_path: PathBuf,
    pub cache_hit: bool,
}

impl RenderedPage {
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }
}

pub struct PdfService {
    file_cache: Arc<dyn FileCachePort>,
    kv_cache: Arc<dyn KeyValueCachePort>,
    reader: Arc<dyn PdfReaderPort>,
    rasterizer: Arc<dyn RasterizerPort>,
    renders: SingleFlight<Option<Vec<u8>>>,
    config: PdfServiceConfig,
}

impl PdfService {
    pub fn new(
        file_cache: Arc<dyn FileCachePort>,
        kv_cache: Arc<dyn KeyValueCachePort>,
        reader: Arc<dyn PdfReaderPort>,
        rasterizer: Arc<dyn RasterizerPort>,
        config: PdfServiceConfig,
    ) -> Self {
        Self {
            file_cache,
            kv_cache,
            reader,
            rasterizer,
            renders: SingleFlight::new(),
            config,
        }
    }

    /// 光栅化程序是否可用
    pub fn rasterizer_available(&self) -> bool {
        self.rasterizer.is_available()
    }

    /// 页数、元数据、文件大小、文件名
    pub fn get_pdf_info(&self, path: &Path) -> Option<PdfInfo> {
        let stamp = SourceStamp::read(path)?;
        let key = format!(
            "pdf_{}_{}_info",
            path_digest(path),
            stamp.modified_nanos
        );

        if let Some(info) = get_json::<PdfInfo>(self.kv_cache.as_ref(), &key) {
            return Some(info);
        }

        let summary = match self.reader.summary(path) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read PDF info");
                return None;
            }
        };

        let info = PdfInfo {
            total_pages: summary.total_pages,
            metadata: summary.metadata,
            file_size: stamp.size,
            file_name: file_name_of(path),
        };
        put_json(self.kv_cache.as_ref(), &key, &info, self.config.info_ttl);
        Some(info)
    }

    /// 1 起始页码的页面文本
    pub fn get_page_text(&self, path: &Path, page_number: u32) -> Option<String> {
        let info = self.get_pdf_info(path)?;
        if let Err(e) = check_page_number(page_number, info.total_pages) {
            tracing::debug!(path = %path.display(), error = %e, "Rejected page text request");
            return None;
        }

        let stamp = SourceStamp::read(path)?;
        let key = format!(
            "pdf_{}_{}_{}_text",
            path_digest(path),
            stamp.modified_nanos,
            page_number
        );
        if let Some(text) = get_json::<String>(self.kv_cache.as_ref(), &key) {
            tracing::debug!(key = %key, "Page text cache hit");
            return Some(text);
        }

        match self.reader.page_text(path, page_number as usize - 1) {
            Ok(text) => {
                put_json(self.kv_cache.as_ref(), &key, &text, self.config.text_ttl);
                Some(text)
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    page = page_number,
                    error = %e,
                    "Failed to extract page text"
                );
                None
            }
        }
    }

    /// 渲染单页并写入文件缓存
    ///
    /// `use_cache` 为 false 时跳过缓存读取，但仍覆盖缓存条目
    pub fn render_page(
        &self,
        path: &Path,
        page_number: u32,
        options: &RenderOptions,
        use_cache: bool,
    ) -> Option<RenderedPage> {
        let info = self.get_pdf_info(path)?;
        if let Err(e) = check_page_number(page_number, info.total_pages) {
            tracing::debug!(path = %path.display(), error = %e, "Rejected page image request");
            return None;
        }

        let artifact = ArtifactKey::new(
            options.artifact_params(page_number),
            options.format.extension(),
        );

        if use_cache {
            if let Some(cached) = self.file_cache.cached_file(path, &CacheType::Pdf, &artifact) {
                match self.file_cache.read(&cached) {
                    Ok(bytes) => {
                        tracing::debug!(cache_path = %cached.display(), "Page image cache hit");
                        return Some(RenderedPage {
                            bytes,
                            cache_path: cached,
                            cache_hit: true,
                        });
                    }
                    Err(e) => {
                        tracing::warn!(cache_path = %cached.display(), error = %e, "Failed to read cached page image");
                    }
                }
            }
        }

        let cache_path = self.file_cache.cache_path(path, &CacheType::Pdf, &artifact)?;
        let flight_key = cache_path.to_string_lossy().to_string();

        let bytes = self.renders.run(&flight_key, || {
            let bytes = match self.rasterizer.rasterize(path, page_number, options) {
                Ok(b) => b,
                Err(e) => {
                    tracing::error!(
                        path = %path.display(),
                        page = page_number,
                        error = %e,
                        "Failed to rasterize page"
                    );
                    return None;
                }
            };

            if let Err(e) = self.file_cache.save(
                path,
                &CacheType::Pdf,
                &artifact,
                CachePayload::Bytes(bytes.clone()),
            ) {
                tracing::error!(cache_path = %cache_path.display(), error = %e, "Failed to cache page image");
            }

            tracing::info!(
                path = %path.display(),
                page = page_number,
                dpi = options.dpi,
                format = %options.format,
                size_bytes = bytes.len(),
                "Page rendered"
            );
            Some(bytes)
        })?;

        Some(RenderedPage {
            bytes,
            cache_path,
            cache_hit: false,
        })
    }

    /// 单页图片的 base64 编码
    pub fn get_page_as_image(
        &self,
        path: &Path,
        page_number: u32,
        options: &RenderOptions,
    ) -> Option<String> {
        self.render_page(path, page_number, options, true)
            .map(|page| page.to_base64())
    }

    /// 目录结构
    pub fn get_pdf_structure(&self, path: &Path) -> Option<PdfStructure> {
        SourceStamp::read(path)?;
        match self.reader.outline(path) {
            Ok(items) => Some(PdfStructure {
                outline: flatten_outline(&items),
            }),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read PDF outline");
                None
            }
        }
    }
}

pub(crate) fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::testing::{CountingRasterizer, FakePdfReader, MemoryKvCache};
    use crate::domain::pdf::{ImageFormat, RawOutlineItem};
    use crate::infrastructure::adapters::storage::DiskFileCache;
    use std::fs::File;
    use std::time::SystemTime;
    use tempfile::{tempdir, TempDir};

    struct Fixture {
        _dir: TempDir,
        cache_root: PathBuf,
        pdf: PathBuf,
        rasterizer: Arc<CountingRasterizer>,
        reader: Arc<FakePdfReader>,
        service: PdfService,
    }

    fn fixture_with(rasterizer: CountingRasterizer, reader: FakePdfReader) -> Fixture {
        let dir = tempdir().unwrap();
        let cache_root = dir.path().join("cache");
        let books = dir.path().join("media/books");
        std::fs::create_dir_all(&books).unwrap();
        let pdf = books.join("sample.pdf");
        std::fs::write(&pdf, b"%PDF-1.4 fake").unwrap();

        let rasterizer = Arc::new(rasterizer);
        let reader = Arc::new(reader);
        let service = PdfService::new(
            Arc::new(DiskFileCache::new(&cache_root).unwrap()),
            Arc::new(MemoryKvCache::default()),
            reader.clone(),
            rasterizer.clone(),
            PdfServiceConfig::default(),
        );
        Fixture {
            _dir: dir,
            cache_root,
            pdf,
            rasterizer,
            reader,
            service,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(CountingRasterizer::new(), FakePdfReader::new(10))
    }

    fn options() -> RenderOptions {
        RenderOptions::new(ImageFormat::Jpeg, 150, 80).unwrap()
    }

    #[test]
    fn test_pdf_info() {
        let fx = fixture();
        let info = fx.service.get_pdf_info(&fx.pdf).unwrap();
        assert_eq!(info.total_pages, 10);
        assert_eq!(info.file_name, "sample.pdf");
        assert_eq!(info.file_size, 13);
        assert_eq!(info.metadata.get("Title").map(String::as_str), Some("Sample"));
    }

    #[test]
    fn test_missing_file_returns_none() {
        let fx = fixture();
        let missing = fx.pdf.with_file_name("missing.pdf");
        assert!(fx.service.get_pdf_info(&missing).is_none());
        assert!(fx.service.get_page_text(&missing, 1).is_none());
        assert!(fx.service.get_page_as_image(&missing, 1, &options()).is_none());
        assert!(fx.service.get_pdf_structure(&missing).is_none());
    }

    #[test]
    fn test_page_text_is_cached() {
        let fx = fixture();
        assert_eq!(
            fx.service.get_page_text(&fx.pdf, 3).as_deref(),
            Some("text of page 3")
        );
        assert_eq!(
            fx.service.get_page_text(&fx.pdf, 3).as_deref(),
            Some("text of page 3")
        );
        assert_eq!(fx.reader.text_calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn test_page_bounds() {
        let fx = fixture();
        assert!(fx.service.get_page_text(&fx.pdf, 0).is_none());
        assert!(fx.service.get_page_text(&fx.pdf, 11).is_none());
        assert!(fx.service.get_page_as_image(&fx.pdf, 0, &options()).is_none());
        assert!(fx.service.get_page_as_image(&fx.pdf, 11, &options()).is_none());
        assert_eq!(fx.rasterizer.calls(), 0);
    }

    #[test]
    fn test_second_render_hits_cache() {
        let fx = fixture();
        let first = fx.service.get_page_as_image(&fx.pdf, 1, &options()).unwrap();
        let second = fx.service.get_page_as_image(&fx.pdf, 1, &options()).unwrap();

        assert_eq!(first, second);
        assert_eq!(fx.rasterizer.calls(), 1);
        assert_eq!(STANDARD.decode(&first).unwrap(), b"JPEG:1:150:80".to_vec());

        let page = fx.service.render_page(&fx.pdf, 1, &options(), true).unwrap();
        assert!(page.cache_hit);
        let rel = page.cache_path.strip_prefix(fx.cache_root.join("pdf_cache")).unwrap();
        let components: Vec<_> = rel.components().collect();
        assert_eq!(components.len(), 2);
        let shard = rel.parent().unwrap().to_string_lossy().to_string();
        let file_name = rel.file_name().unwrap().to_string_lossy().to_string();
        assert_eq!(shard.len(), 2);
        assert!(file_name.starts_with(&shard));
        assert!(file_name.ends_with(".jpg"));
    }

    #[test]
    fn test_use_cache_false_rerenders() {
        let fx = fixture();
        fx.service.render_page(&fx.pdf, 2, &options(), true).unwrap();
        let page = fx.service.render_page(&fx.pdf, 2, &options(), false).unwrap();
        assert!(!page.cache_hit);
        assert_eq!(fx.rasterizer.calls(), 2);
    }

    #[test]
    fn test_touching_source_changes_cache_key() {
        let fx = fixture();
        let before = fx.service.render_page(&fx.pdf, 1, &options(), true).unwrap();

        let file = File::options().write(true).open(&fx.pdf).unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(60))
            .unwrap();
        drop(file);

        let after = fx.service.render_page(&fx.pdf, 1, &options(), true).unwrap();
        assert!(!after.cache_hit);
        assert_ne!(before.cache_path, after.cache_path);
        assert_eq!(fx.rasterizer.calls(), 2);
    }

    #[test]
    fn test_failed_render_is_not_cached() {
        let mut rasterizer = CountingRasterizer::new();
        rasterizer.fail_pages = vec![4];
        let fx = fixture_with(rasterizer, FakePdfReader::new(10));

        assert!(fx.service.get_page_as_image(&fx.pdf, 4, &options()).is_none());
        assert!(fx.service.get_page_as_image(&fx.pdf, 4, &options()).is_none());
        assert_eq!(fx.rasterizer.calls(), 2);
    }

    #[test]
    fn test_concurrent_renders_coalesce() {
        let mut rasterizer = CountingRasterizer::new();
        rasterizer.delay = Duration::from_millis(200);
        let fx = Arc::new(fixture_with(rasterizer, FakePdfReader::new(10)));
        let barrier = Arc::new(std::sync::Barrier::new(4));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let fx = fx.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    fx.service.get_page_as_image(&fx.pdf, 5, &options())
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(results.iter().all(|r| r == &results[0] && r.is_some()));
        assert_eq!(fx.rasterizer.calls(), 1);
    }

    #[test]
    fn test_structure() {
        let mut reader = FakePdfReader::new(10);
        reader.outline = vec![RawOutlineItem {
            title: Some("Intro".into()),
            page: Some(1),
            children: vec![],
        }];
        let fx = fixture_with(CountingRasterizer::new(), reader);
        let structure = fx.service.get_pdf_structure(&fx.pdf).unwrap();
        assert_eq!(structure.outline.len(), 1);
    }
}
