//! Pagecast - PDF 与有声书媒体服务
//!
//! - Domain: cache/, pdf/, audio/
//! - Application: ports, services
//! - Infrastructure: http, memory, worker, persistence, adapters

use std::sync::Arc;
use std::time::Duration;

use pagecast::application::ports::{
    EvictionPolicy, FileCachePort, KeyValueCachePort, TaskQueuePort,
};
use pagecast::application::services::{
    AudioService, AudioServiceConfig, CacheAdminService, ChunkedUploadConfig,
    ChunkedUploadService, PdfService, PdfServiceConfig, PreloadService,
};
use pagecast::config::{load_config, print_config, AppConfig};
use pagecast::infrastructure::adapters::{
    DiskFileCache, FsContentCatalog, PdfiumReader, PdfiumReaderConfig, PopplerRasterizer,
    PopplerRasterizerConfig, SymphoniaProbe,
};
use pagecast::infrastructure::http::{
    AppState, HttpServer, MediaSettings, RequestDefaults, ServerConfig,
};
use pagecast::infrastructure::persistence::{SledCacheConfig, SledKvCache};
use pagecast::infrastructure::worker::{
    spawn_cache_gc, AsyncLoader, AsyncLoaderConfig, CacheGcConfig,
};

fn init_tracing(config: &AppConfig) {
    let log_filter = format!(
        "{},pagecast={},tower_http=debug",
        config.log.level, config.log.level
    );
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_filter));

    if config.log.json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// `0` 表示不限制
fn non_zero<T: PartialEq + Default>(value: T) -> Option<T> {
    (value != T::default()).then_some(value)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置（优先级：环境变量 > 配置文件 > 默认值）
    let config = load_config().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    init_tracing(&config);

    tracing::info!("Pagecast - PDF & audio media service");
    print_config(&config);

    // 确保数据目录存在
    for dir in [
        &config.storage.media_root,
        &config.storage.books_dir,
        &config.storage.audio_dir,
        &config.storage.cache_dir,
    ] {
        tokio::fs::create_dir_all(dir).await?;
    }
    if let Some(parent) = config.storage.kv_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    // 缓存
    let file_cache: Arc<dyn FileCachePort> = Arc::new(DiskFileCache::new(&config.storage.cache_dir)?);
    let kv_store = Arc::new(SledKvCache::new(&SledCacheConfig {
        db_path: config.storage.kv_path.to_string_lossy().to_string(),
        max_size_bytes: config.storage.kv_max_bytes,
    })?);
    let kv_cache: Arc<dyn KeyValueCachePort> = kv_store.clone();

    // PDF / 音频适配器
    let reader = Arc::new(PdfiumReader::new(PdfiumReaderConfig {
        library_dirs: config.pdf.pdfium_library_dirs.clone(),
    }));
    let rasterizer = Arc::new(PopplerRasterizer::new(&PopplerRasterizerConfig {
        binary: config.pdf.rasterizer_binary.clone(),
        search_dirs: config.pdf.rasterizer_search_dirs.clone(),
    }));
    let probe = Arc::new(SymphoniaProbe::new());

    let pdf_service = Arc::new(PdfService::new(
        file_cache.clone(),
        kv_cache.clone(),
        reader,
        rasterizer,
        PdfServiceConfig {
            text_ttl: config.pdf.text_ttl(),
            info_ttl: config.pdf.info_ttl(),
        },
    ));
    let audio_service = Arc::new(AudioService::new(
        file_cache.clone(),
        kv_cache.clone(),
        probe,
        AudioServiceConfig {
            info_ttl: Duration::from_secs(config.audio.info_ttl_secs),
            chunk_ttl: Duration::from_secs(config.audio.chunk_ttl_secs),
        },
    ));

    // 后台加载器
    let loader = Arc::new(AsyncLoader::new(AsyncLoaderConfig {
        workers: config.loader.workers,
        poll_interval: Duration::from_millis(config.loader.poll_interval_ms),
    }));
    loader.start_workers();
    let queue: Arc<dyn TaskQueuePort> = loader.clone();

    let preload_service = Arc::new(PreloadService::new(
        pdf_service.clone(),
        audio_service.clone(),
        queue,
    ));
    let upload_service = Arc::new(ChunkedUploadService::new(ChunkedUploadConfig {
        temp_dir: config.storage.upload_temp_dir.clone(),
        upload_dir: config.storage.upload_dir.clone(),
        max_chunk_bytes: config.storage.max_chunk_bytes,
    })?);
    let cache_admin = Arc::new(CacheAdminService::new(file_cache.clone(), kv_cache.clone()));

    // 缓存清理
    let gc_handle = config.gc.enabled.then(|| {
        spawn_cache_gc(
            file_cache.clone(),
            kv_cache.clone(),
            CacheGcConfig {
                interval: Duration::from_secs(config.gc.interval_secs),
                policy: EvictionPolicy {
                    max_age: non_zero(config.gc.max_age_secs).map(Duration::from_secs),
                    max_bytes: non_zero(config.gc.max_cache_bytes),
                },
            },
        )
    });

    let render = config
        .pdf
        .render_options()
        .map_err(|e| anyhow::anyhow!("Invalid PDF defaults: {}", e))?;
    let state = AppState::new(
        pdf_service,
        audio_service,
        preload_service,
        upload_service,
        cache_admin,
        Arc::new(FsContentCatalog::new(
            &config.storage.books_dir,
            &config.storage.audio_dir,
        )),
        MediaSettings {
            base_url: config.server.public_base_url(),
            media_root: config.storage.media_root.clone(),
            url_prefix: config.server.media_prefix.clone(),
        },
        RequestDefaults {
            render,
            chunk_size: config.audio.chunk_size,
        },
    );

    // 创建 HTTP 服务器
    let mut server_config = ServerConfig::new(&config.server.host, config.server.port);
    server_config.max_body_bytes = config.server.max_body_bytes;
    if config.server.serve_media {
        server_config.media_mount = Some((
            config.server.media_prefix.clone(),
            config.storage.media_root.clone(),
        ));
    }
    let server = HttpServer::new(server_config, state);

    tracing::info!("Starting HTTP server...");

    // 启动服务器（带优雅关闭）
    server
        .run_with_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for ctrl-c");
            }
            tracing::info!("Received shutdown signal");
        })
        .await?;

    if let Some(handle) = gc_handle {
        handle.abort();
    }

    // 排空队列后停止 worker
    let stopping = loader.clone();
    tokio::task::spawn_blocking(move || stopping.stop_workers()).await?;

    if let Err(e) = kv_store.flush() {
        tracing::warn!(error = %e, "Failed to flush KV cache");
    }

    tracing::info!("Server shutdown complete");

    Ok(())
}
