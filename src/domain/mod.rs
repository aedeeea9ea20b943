//! Domain Layer - 领域层
//!
//! 三个限界上下文:
//! - Cache Context: 缓存 key 与缓存类型
//! - PDF Context: 渲染参数、文档信息、目录结构
//! - Audio Context: 字节范围、标记、分块

pub mod audio;
pub mod cache;
pub mod pdf;
