//! 应用层 - 用例编排
//!
//! 包含：
//! - ports: 六边形架构端口定义（文件缓存、KV 缓存、PDF 读取、光栅化、音频探测、任务队列、内容目录）
//! - services: PDF / 音频 / 预加载 / 分块上传 / 缓存维护
//! - error: 应用层错误定义

pub mod error;
pub mod ports;
pub mod services;

pub use error::ApplicationError;

pub use ports::{
    // File cache
    CachePayload,
    EvictionPolicy,
    FileCacheError,
    FileCachePort,
    // KV cache
    KeyValueCachePort,
    KvCacheError,
    // External tools
    AudioProbePort,
    PdfReaderPort,
    RasterizerPort,
    // Catalog
    ContentCatalogPort,
    ContentRecord,
    // Task queue
    TaskError,
    TaskOutcome,
    TaskQueuePort,
    TaskState,
};

pub use services::{
    AudioService, AudioServiceConfig, CacheAdminService, ChunkedUploadConfig,
    ChunkedUploadService, PdfService, PdfServiceConfig, PreloadService, PreloadStatus,
};
