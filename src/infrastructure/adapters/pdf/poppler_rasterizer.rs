//! Poppler Rasterizer - 调用 `pdftoppm` 渲染单页
//!
//! 实现 RasterizerPort。启动时在 PATH 与候选目录中查找可执行文件

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::application::ports::{RasterizeError, RasterizerPort};
use crate::domain::pdf::{ImageFormat, RenderOptions};

/// Poppler 光栅化器配置
#[derive(Debug, Clone)]
pub struct PopplerRasterizerConfig {
    /// 可执行文件名或绝对路径
    pub binary: String,
    /// PATH 中找不到时依次尝试的目录
    pub search_dirs: Vec<PathBuf>,
}

impl Default for PopplerRasterizerConfig {
    fn default() -> Self {
        Self {
            binary: "pdftoppm".to_string(),
            search_dirs: vec![
                PathBuf::from("/usr/bin"),
                PathBuf::from("/usr/local/bin"),
                PathBuf::from("/opt/homebrew/bin"),
                PathBuf::from("/opt/local/bin"),
            ],
        }
    }
}

pub struct PopplerRasterizer {
    binary: Option<PathBuf>,
}

impl PopplerRasterizer {
    pub fn new(config: &PopplerRasterizerConfig) -> Self {
        let binary = Self::discover(config);
        match &binary {
            Some(path) => tracing::info!(binary = %path.display(), "PDF rasterizer found"),
            None => tracing::warn!(
                binary = %config.binary,
                "PDF rasterizer not found; page images are unavailable"
            ),
        }
        Self { binary }
    }

    fn discover(config: &PopplerRasterizerConfig) -> Option<PathBuf> {
        let configured = Path::new(&config.binary);
        if configured.is_absolute() {
            if configured.is_file() {
                return Some(configured.to_path_buf());
            }
            tracing::warn!(binary = %configured.display(), "Configured rasterizer path does not exist");
        }

        let name = configured.file_name()?.to_string_lossy().to_string();
        if let Ok(path) = which::which(&name) {
            return Some(path);
        }

        config
            .search_dirs
            .iter()
            .map(|dir| dir.join(&name))
            .find(|candidate| candidate.is_file())
    }

    /// pdftoppm 的输出扩展名
    fn output_extension(format: ImageFormat) -> &'static str {
        match format {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
            ImageFormat::Tiff => "tif",
        }
    }

    fn build_args(page_number: u32, options: &RenderOptions) -> Vec<String> {
        let mut args = vec![
            "-f".to_string(),
            page_number.to_string(),
            "-l".to_string(),
            page_number.to_string(),
            "-r".to_string(),
            options.dpi.to_string(),
            "-singlefile".to_string(),
        ];
        match options.format {
            ImageFormat::Jpeg => {
                args.push("-jpeg".to_string());
                args.push("-jpegopt".to_string());
                args.push(format!("quality={}", options.quality));
            }
            ImageFormat::Png => args.push("-png".to_string()),
            ImageFormat::Tiff => args.push("-tiff".to_string()),
        }
        args
    }
}

impl RasterizerPort for PopplerRasterizer {
    fn rasterize(
        &self,
        path: &Path,
        page_number: u32,
        options: &RenderOptions,
    ) -> Result<Vec<u8>, RasterizeError> {
        let binary = self
            .binary
            .as_ref()
            .ok_or_else(|| RasterizeError::BinaryNotFound("pdftoppm".to_string()))?;

        let workdir = tempfile::tempdir().map_err(|e| RasterizeError::IoError(e.to_string()))?;
        let prefix = workdir.path().join("page");

        let output = Command::new(binary)
            .args(Self::build_args(page_number, options))
            .arg(path)
            .arg(&prefix)
            .output()
            .map_err(|e| RasterizeError::ProcessFailed(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RasterizeError::ProcessFailed(format!(
                "{} exited with {}: {}",
                binary.display(),
                output.status,
                stderr.trim()
            )));
        }

        let image_path = prefix.with_extension(Self::output_extension(options.format));
        let bytes = std::fs::read(&image_path).map_err(|_| RasterizeError::EmptyOutput)?;
        if bytes.is_empty() {
            return Err(RasterizeError::EmptyOutput);
        }
        Ok(bytes)
    }

    fn is_available(&self) -> bool {
        self.binary.is_some()
    }
}
