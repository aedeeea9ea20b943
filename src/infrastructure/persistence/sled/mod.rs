//! Sled 存储

mod kv_cache;

pub use kv_cache::{SledCacheConfig, SledKvCache};
