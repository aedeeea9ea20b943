//! Cache Context - 派生产物缓存
//!
//! 缓存 key 由源文件路径、修改时间与操作参数组成，
//! 源文件修改时间变化后旧条目自然失效（key 不再命中）

mod errors;
mod value_objects;

pub use errors::CacheKeyError;
pub use value_objects::{path_digest, ArtifactKey, CacheKey, CacheType, SourceStamp};
