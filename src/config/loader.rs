//! Configuration Loader
//!
//! 实现多源配置加载与合并逻辑
//!
//! 优先级（从高到低）：
//! 1. 环境变量
//! 2. 配置文件（config.toml）
//! 3. 默认值

use config::{Config, ConfigError as ConfigCrateError, Environment, File};
use std::path::Path;
use thiserror::Error;

use super::types::AppConfig;
use crate::domain::pdf::MAX_DPI;

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigCrateError> for ConfigError {
    fn from(err: ConfigCrateError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

/// 配置文件搜索路径
const CONFIG_FILE_NAMES: &[&str] = &["config", "config.local"];

/// 加载应用配置
///
/// 按优先级从高到低合并配置：
/// 1. 环境变量（前缀 `PAGECAST_`，层级分隔符 `__`）
/// 2. 配置文件（config.toml 或 config.local.toml）
/// 3. 默认值
///
/// # 环境变量示例
/// - `PAGECAST_SERVER__PORT=8080`
/// - `PAGECAST_STORAGE__MEDIA_ROOT=/srv/media`
/// - `PAGECAST_LOADER__WORKERS=8`
/// - `PAGECAST_PDF__RASTERIZER_BINARY=/opt/poppler/bin/pdftoppm`
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from_path(None)
}

/// 从指定路径加载配置
///
/// # 参数
/// - `config_path` - 可选的配置文件路径，如果为 None 则使用默认搜索路径
pub fn load_config_from_path(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. 默认值（最低优先级）
    builder = builder
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 5060)?
        .set_default("server.serve_media", true)?
        .set_default("server.media_prefix", "/media")?
        .set_default("storage.media_root", "data/media")?
        .set_default("storage.books_dir", "data/media/books")?
        .set_default("storage.audio_dir", "data/media/audio")?
        .set_default("storage.cache_dir", "data/cache")?
        .set_default("storage.kv_path", "data/cache/kv.sled")?
        .set_default("pdf.dpi", 200)?
        .set_default("pdf.format", "jpeg")?
        .set_default("pdf.quality", 85)?
        .set_default("loader.workers", 5)?
        .set_default("loader.poll_interval_ms", 1000)?
        .set_default("gc.enabled", true)?
        .set_default("gc.interval_secs", 3600)?
        .set_default("log.level", "info")?
        .set_default("log.json", false)?;

    // 2. 配置文件（如果存在）
    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    // 3. 环境变量（最高优先级）
    // 例如: PAGECAST_GC__MAX_CACHE_BYTES=1073741824
    // 注意: 环境变量名会被转换为小写
    builder = builder.add_source(
        Environment::with_prefix("PAGECAST")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;

    let app_config: AppConfig = config.try_deserialize().map_err(|e| {
        ConfigError::ParseError(format!("Failed to deserialize config: {}", e))
    })?;

    validate_config(&app_config)?;

    Ok(app_config)
}

/// 验证配置有效性
fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "Server port cannot be 0".to_string(),
        ));
    }

    if config.loader.workers == 0 {
        return Err(ConfigError::ValidationError(
            "Loader worker count cannot be 0".to_string(),
        ));
    }

    if config.storage.media_root.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "Media root cannot be empty".to_string(),
        ));
    }

    if config.gc.enabled && config.gc.interval_secs == 0 {
        return Err(ConfigError::ValidationError(
            "GC interval cannot be 0 when GC is enabled".to_string(),
        ));
    }

    if config.pdf.quality == 0 || config.pdf.quality > 100 {
        return Err(ConfigError::ValidationError(format!(
            "Default quality must be between 1 and 100, got {}",
            config.pdf.quality
        )));
    }

    if config.pdf.dpi == 0 || config.pdf.dpi > MAX_DPI {
        return Err(ConfigError::ValidationError(format!(
            "Default DPI must be between 1 and {}, got {}",
            MAX_DPI, config.pdf.dpi
        )));
    }

    if !config.server.media_prefix.starts_with('/') {
        return Err(ConfigError::ValidationError(format!(
            "Media prefix must start with '/', got {}",
            config.server.media_prefix
        )));
    }

    Ok(())
}

/// 打印配置信息（用于启动时日志）
pub fn print_config(config: &AppConfig) {
    tracing::info!("=== Application Configuration ===");
    tracing::info!("Server: {}:{}", config.server.host, config.server.port);
    tracing::info!("Public Base URL: {}", config.server.public_base_url());
    if config.server.serve_media {
        tracing::info!("Media Mount: {}", config.server.media_prefix);
    }
    tracing::info!("Media Root: {:?}", config.storage.media_root);
    tracing::info!("Books Directory: {:?}", config.storage.books_dir);
    tracing::info!("Audio Directory: {:?}", config.storage.audio_dir);
    tracing::info!("Cache Directory: {:?}", config.storage.cache_dir);
    tracing::info!("KV Cache: {:?}", config.storage.kv_path);
    tracing::info!(
        "PDF Defaults: {} dpi, {}, quality {}",
        config.pdf.dpi,
        config.pdf.format,
        config.pdf.quality
    );
    tracing::info!("Rasterizer: {}", config.pdf.rasterizer_binary);
    tracing::info!("Loader Workers: {}", config.loader.workers);
    tracing::info!("GC Enabled: {}", config.gc.enabled);
    if config.gc.enabled {
        tracing::info!("GC Interval: {}s", config.gc.interval_secs);
        tracing::info!("GC Max Cache Bytes: {}", config.gc.max_cache_bytes);
    }
    tracing::info!("Log Level: {}", config.log.level);
    tracing::info!("=================================");
}
