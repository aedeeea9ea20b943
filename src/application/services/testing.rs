//! 测试用端口替身

use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crate::application::ports::{
    AudioProbeError, AudioProbePort, AudioTags, KeyValueCachePort, KvCacheError, KvCacheStats,
    PdfDocumentSummary, PdfReaderError, PdfReaderPort, RasterizeError, RasterizerPort,
};
use crate::domain::pdf::{RawOutlineItem, RenderOptions};

/// 固定页数的 PDF 读取器，不解析文件内容
pub struct FakePdfReader {
    pub total_pages: usize,
    pub outline: Vec<RawOutlineItem>,
    pub text_calls: AtomicUsize,
}

impl FakePdfReader {
    pub fn new(total_pages: usize) -> Self {
        Self {
            total_pages,
            outline: Vec::new(),
            text_calls: AtomicUsize::new(0),
        }
    }
}

impl PdfReaderPort for FakePdfReader {
    fn summary(&self, path: &Path) -> Result<PdfDocumentSummary, PdfReaderError> {
        if !path.exists() {
            return Err(PdfReaderError::LoadError(path.display().to_string()));
        }
        let mut metadata = BTreeMap::new();
        metadata.insert("Title".to_string(), "Sample".to_string());
        Ok(PdfDocumentSummary {
            total_pages: self.total_pages,
            metadata,
        })
    }

    fn page_text(&self, _path: &Path, page_index: usize) -> Result<String, PdfReaderError> {
        if page_index >= self.total_pages {
            return Err(PdfReaderError::PageNotFound(page_index));
        }
        self.text_calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("text of page {}", page_index + 1))
    }

    fn outline(&self, _path: &Path) -> Result<Vec<RawOutlineItem>, PdfReaderError> {
        Ok(self.outline.clone())
    }
}

/// 记录调用次数的光栅化器
pub struct CountingRasterizer {
    pub calls: AtomicUsize,
    pub delay: Duration,
    pub fail_pages: Vec<u32>,
}

impl CountingRasterizer {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
            fail_pages: Vec::new(),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RasterizerPort for CountingRasterizer {
    fn rasterize(
        &self,
        _path: &Path,
        page_number: u32,
        options: &RenderOptions,
    ) -> Result<Vec<u8>, RasterizeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        if self.fail_pages.contains(&page_number) {
            return Err(RasterizeError::ProcessFailed(format!("page {}", page_number)));
        }
        Ok(format!(
            "{}:{}:{}:{}",
            options.format, page_number, options.dpi, options.quality
        )
        .into_bytes())
    }

    fn is_available(&self) -> bool {
        true
    }
}

/// 内存 KV 缓存
#[derive(Default)]
pub struct MemoryKvCache {
    entries: Mutex<HashMap<String, (Vec<u8>, Instant)>>,
}

impl KeyValueCachePort for MemoryKvCache {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KvCacheError> {
        let entries = self.entries.lock();
        Ok(entries
            .get(key)
            .filter(|(_, expires)| *expires > Instant::now())
            .map(|(v, _)| v.clone()))
    }

    fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), KvCacheError> {
        self.entries
            .lock()
            .insert(key.to_string(), (value, Instant::now() + ttl));
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), KvCacheError> {
        self.entries.lock().remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), KvCacheError> {
        self.entries.lock().clear();
        Ok(())
    }

    fn stats(&self) -> KvCacheStats {
        KvCacheStats {
            total_entries: self.entries.lock().len(),
            ..KvCacheStats::default()
        }
    }
}

/// 固定返回值的音频探测
pub struct FakeAudioProbe {
    pub tags: Option<AudioTags>,
}

impl AudioProbePort for FakeAudioProbe {
    fn probe(&self, path: &Path) -> Result<AudioTags, AudioProbeError> {
        self.tags
            .clone()
            .ok_or_else(|| AudioProbeError::Unsupported(path.display().to_string()))
    }
}
