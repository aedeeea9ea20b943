//! Worker Layer - Background Task Processing
//!
//! 预加载任务线程池与缓存清理任务

mod async_loader;
mod cache_gc;

pub use async_loader::{AsyncLoader, AsyncLoaderConfig};
pub use cache_gc::{spawn_cache_gc, CacheGcConfig};
