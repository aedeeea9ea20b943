//! Persistence Layer - 数据持久化
//!
//! Sled 键值缓存实现

pub mod sled;

pub use self::sled::{SledCacheConfig, SledKvCache};
