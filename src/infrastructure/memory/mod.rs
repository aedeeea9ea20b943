//! Memory Layer - In-Memory State Management
//!
//! 后台任务的内存状态

mod task_registry;

pub use task_registry::TaskRegistry;
