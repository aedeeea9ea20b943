//! Infrastructure Adapters
//!
//! 六边形架构的适配器实现

pub mod audio;
pub mod pdf;
pub mod storage;

pub use audio::*;
pub use pdf::*;
pub use storage::*;
