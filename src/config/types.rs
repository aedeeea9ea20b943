//! Configuration Types
//!
//! 定义所有配置结构体

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::domain::audio::DEFAULT_CHUNK_SIZE;
use crate::domain::pdf::{ImageFormat, RenderOptions, DEFAULT_DPI, DEFAULT_QUALITY};

/// 应用主配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// 服务器配置
    #[serde(default)]
    pub server: ServerConfig,

    /// 存储配置
    #[serde(default)]
    pub storage: StorageConfig,

    /// PDF 配置
    #[serde(default)]
    pub pdf: PdfConfig,

    /// 音频配置
    #[serde(default)]
    pub audio: AudioConfig,

    /// 后台加载器配置
    #[serde(default)]
    pub loader: LoaderConfig,

    /// GC 配置
    #[serde(default)]
    pub gc: GcConfig,

    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "default_host")]
    pub host: String,

    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,

    /// 公开访问的 Base URL，用于生成 pdf_url / audio_url
    /// 如果未设置，则使用 http://{host}:{port}
    #[serde(default)]
    pub base_url: Option<String>,

    /// 是否直接托管媒体文件
    #[serde(default = "default_serve_media")]
    pub serve_media: bool,

    /// 媒体文件 URL 前缀
    #[serde(default = "default_media_prefix")]
    pub media_prefix: String,

    /// 请求体上限（字节）
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5060
}

fn default_serve_media() -> bool {
    true
}

fn default_media_prefix() -> String {
    "/media".to_string()
}

fn default_max_body_bytes() -> usize {
    50 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            base_url: None,
            serve_media: default_serve_media(),
            media_prefix: default_media_prefix(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl ServerConfig {
    /// 获取服务器地址
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// 获取公开的 Base URL
    pub fn public_base_url(&self) -> String {
        self.base_url.clone().unwrap_or_else(|| {
            let host = if self.host == "0.0.0.0" {
                "localhost"
            } else {
                &self.host
            };
            format!("http://{}:{}", host, self.port)
        })
    }
}

/// 存储配置
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// 媒体根目录，pdf_url / audio_url 相对于此生成
    #[serde(default = "default_media_root")]
    pub media_root: PathBuf,

    /// PDF 目录
    #[serde(default = "default_books_dir")]
    pub books_dir: PathBuf,

    /// 音频目录
    #[serde(default = "default_audio_dir")]
    pub audio_dir: PathBuf,

    /// 文件缓存根目录，其下按类型分为 `pdf_cache` / `audio_cache`
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// KV 缓存数据库路径
    #[serde(default = "default_kv_path")]
    pub kv_path: PathBuf,

    /// KV 缓存上限（字节）
    #[serde(default = "default_kv_max_bytes")]
    pub kv_max_bytes: u64,

    /// 分块上传临时目录
    #[serde(default = "default_upload_temp_dir")]
    pub upload_temp_dir: PathBuf,

    /// 上传文件目录
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,

    /// 单个上传分块最大大小（字节）
    #[serde(default = "default_max_chunk_bytes")]
    pub max_chunk_bytes: u64,
}

fn default_media_root() -> PathBuf {
    PathBuf::from("data/media")
}

fn default_books_dir() -> PathBuf {
    PathBuf::from("data/media/books")
}

fn default_audio_dir() -> PathBuf {
    PathBuf::from("data/media/audio")
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("data/cache")
}

fn default_kv_path() -> PathBuf {
    PathBuf::from("data/cache/kv.sled")
}

fn default_kv_max_bytes() -> u64 {
    512 * 1024 * 1024 // 512 MB
}

fn default_upload_temp_dir() -> PathBuf {
    PathBuf::from("data/upload_tmp")
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("data/media/uploads")
}

fn default_max_chunk_bytes() -> u64 {
    20 * 1024 * 1024 // 20 MB
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            media_root: default_media_root(),
            books_dir: default_books_dir(),
            audio_dir: default_audio_dir(),
            cache_dir: default_cache_dir(),
            kv_path: default_kv_path(),
            kv_max_bytes: default_kv_max_bytes(),
            upload_temp_dir: default_upload_temp_dir(),
            upload_dir: default_upload_dir(),
            max_chunk_bytes: default_max_chunk_bytes(),
        }
    }
}

/// PDF 配置
#[derive(Debug, Clone, Deserialize)]
pub struct PdfConfig {
    /// 默认 DPI
    #[serde(default = "default_dpi")]
    pub dpi: u32,

    /// 默认图片格式：jpeg / png / tiff
    #[serde(default = "default_format")]
    pub format: String,

    /// 默认 JPEG 质量 (1-100)
    #[serde(default = "default_quality")]
    pub quality: u32,

    /// 页面文本缓存时间（秒）
    #[serde(default = "default_ttl_secs")]
    pub text_ttl_secs: u64,

    /// 文档信息缓存时间（秒）
    #[serde(default = "default_ttl_secs")]
    pub info_ttl_secs: u64,

    /// 光栅化程序名或路径
    #[serde(default = "default_rasterizer_binary")]
    pub rasterizer_binary: String,

    /// PATH 之外的光栅化程序搜索目录
    #[serde(default = "default_rasterizer_search_dirs")]
    pub rasterizer_search_dirs: Vec<PathBuf>,

    /// pdfium 动态库搜索目录
    #[serde(default = "default_pdfium_library_dirs")]
    pub pdfium_library_dirs: Vec<PathBuf>,
}

fn default_dpi() -> u32 {
    DEFAULT_DPI
}

fn default_format() -> String {
    "jpeg".to_string()
}

fn default_quality() -> u32 {
    DEFAULT_QUALITY as u32
}

fn default_ttl_secs() -> u64 {
    3600 // 1 小时
}

fn default_rasterizer_binary() -> String {
    "pdftoppm".to_string()
}

fn default_rasterizer_search_dirs() -> Vec<PathBuf> {
    ["/usr/bin", "/usr/local/bin", "/opt/homebrew/bin", "/opt/local/bin"]
        .iter()
        .map(PathBuf::from)
        .collect()
}

fn default_pdfium_library_dirs() -> Vec<PathBuf> {
    ["./", "/usr/lib", "/usr/local/lib"]
        .iter()
        .map(PathBuf::from)
        .collect()
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            dpi: default_dpi(),
            format: default_format(),
            quality: default_quality(),
            text_ttl_secs: default_ttl_secs(),
            info_ttl_secs: default_ttl_secs(),
            rasterizer_binary: default_rasterizer_binary(),
            rasterizer_search_dirs: default_rasterizer_search_dirs(),
            pdfium_library_dirs: default_pdfium_library_dirs(),
        }
    }
}

impl PdfConfig {
    /// 默认渲染参数，格式无法识别时回退为 JPEG
    pub fn render_options(&self) -> Result<RenderOptions, crate::domain::pdf::PdfError> {
        RenderOptions::new(
            ImageFormat::parse_or_default(Some(&self.format)),
            self.dpi,
            self.quality,
        )
    }

    pub fn text_ttl(&self) -> Duration {
        Duration::from_secs(self.text_ttl_secs)
    }

    pub fn info_ttl(&self) -> Duration {
        Duration::from_secs(self.info_ttl_secs)
    }
}

/// 音频配置
#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    /// 音频信息缓存时间（秒）
    #[serde(default = "default_ttl_secs")]
    pub info_ttl_secs: u64,

    /// 分块缓存时间（秒）
    #[serde(default = "default_ttl_secs")]
    pub chunk_ttl_secs: u64,

    /// 默认分块大小（字节）
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,
}

fn default_chunk_size() -> u64 {
    DEFAULT_CHUNK_SIZE
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            info_ttl_secs: default_ttl_secs(),
            chunk_ttl_secs: default_ttl_secs(),
            chunk_size: default_chunk_size(),
        }
    }
}

/// 后台加载器配置
#[derive(Debug, Clone, Deserialize)]
pub struct LoaderConfig {
    /// worker 线程数
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// 队列轮询间隔（毫秒）
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_workers() -> usize {
    5
}

fn default_poll_interval_ms() -> u64 {
    1000
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

/// GC（缓存清理）配置
#[derive(Debug, Clone, Deserialize)]
pub struct GcConfig {
    /// 是否启用自动 GC
    #[serde(default = "default_gc_enabled")]
    pub enabled: bool,

    /// GC 间隔时间（秒）
    #[serde(default = "default_gc_interval")]
    pub interval_secs: u64,

    /// 文件缓存大小上限（字节），0 表示不限制
    #[serde(default = "default_max_cache_bytes")]
    pub max_cache_bytes: u64,

    /// 产物最长保留时间（秒），0 表示不限制
    #[serde(default = "default_max_age")]
    pub max_age_secs: u64,
}

fn default_gc_enabled() -> bool {
    true
}

fn default_gc_interval() -> u64 {
    3600 // 1 小时
}

fn default_max_cache_bytes() -> u64 {
    10 * 1024 * 1024 * 1024 // 10 GB
}

fn default_max_age() -> u64 {
    30 * 86400 // 30 天
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            enabled: default_gc_enabled(),
            interval_secs: default_gc_interval(),
            max_cache_bytes: default_max_cache_bytes(),
            max_age_secs: default_max_age(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否启用 JSON 格式
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
