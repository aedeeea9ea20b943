//! Infrastructure Layer - 基础设施层
//!
//! 提供所有端口的具体实现

pub mod adapters;
pub mod http;
pub mod memory;
pub mod persistence;
pub mod worker;

pub use memory::TaskRegistry;
pub use persistence::sled::{SledCacheConfig, SledKvCache};
pub use worker::{spawn_cache_gc, AsyncLoader, AsyncLoaderConfig, CacheGcConfig};
