//! Storage Adapters - 文件系统缓存与内容目录

mod content_catalog;
mod disk_file_cache;

pub use content_catalog::FsContentCatalog;
pub use disk_file_cache::DiskFileCache;
