//! Pagecast - PDF 与有声书媒体服务
//!
//! 架构设计: Hexagonal Architecture
//!
//! 领域层 (domain/):
//! - Cache Context: 缓存 key、缓存类型
//! - PDF Context: 渲染参数、文档信息、目录结构
//! - Audio Context: 字节范围、标记、分块布局
//!
//! 应用层 (application/):
//! - Ports: 端口定义（FileCache, KeyValueCache, PdfReader, Rasterizer, AudioProbe, TaskQueue）
//! - Services: PDF / 音频 / 预加载 / 上传 / 缓存管理
//!
//! 基础设施层 (infrastructure/):
//! - HTTP: RESTful API + 媒体文件托管
//! - Memory: 任务注册表
//! - Worker: 后台加载线程池、缓存清理
//! - Persistence: Sled KV 缓存
//! - Adapters: 磁盘缓存、pdfium、poppler、symphonia、内容目录

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::{load_config, AppConfig};
