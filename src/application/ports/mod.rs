//! Application Ports - 出站端口定义
//!
//! 定义应用层与基础设施层的抽象接口

mod audio_probe;
mod content_catalog;
mod file_cache;
mod kv_cache;
mod pdf_reader;
mod rasterizer;
mod task_queue;

pub use audio_probe::{AudioProbeError, AudioProbePort, AudioTags};
pub use content_catalog::{CatalogError, ContentCatalogPort, ContentRecord};
pub use file_cache::{
    hash_file, CachePayload, CacheRootStats, EvictionPolicy, FileCacheError, FileCachePort,
    SweepReport,
};
pub use kv_cache::{get_json, put_json, KeyValueCachePort, KvCacheError, KvCacheStats};
pub use pdf_reader::{PdfDocumentSummary, PdfReaderError, PdfReaderPort};
pub use rasterizer::{RasterizeError, RasterizerPort};
pub use task_queue::{
    TaskCallback, TaskError, TaskJob, TaskOutcome, TaskQueuePort, TaskSnapshot, TaskState,
    TaskStats,
};
