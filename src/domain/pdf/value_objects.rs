//! PDF Context - Value Objects

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::errors::PdfError;
use super::outline::OutlineNode;

pub const DEFAULT_DPI: u32 = 200;
pub const DEFAULT_QUALITY: u8 = 85;
pub const MAX_DPI: u32 = 1200;

/// 页面图片格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ImageFormat {
    #[default]
    Jpeg,
    Png,
    Tiff,
}

impl ImageFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "JPEG",
            ImageFormat::Png => "PNG",
            ImageFormat::Tiff => "TIFF",
        }
    }

    /// 大小写不敏感解析，`JPG` 视为 JPEG
    pub fn parse(s: &str) -> Result<Self, PdfError> {
        match s.trim().to_uppercase().as_str() {
            "JPEG" | "JPG" => Ok(ImageFormat::Jpeg),
            "PNG" => Ok(ImageFormat::Png),
            "TIFF" | "TIF" => Ok(ImageFormat::Tiff),
            _ => Err(PdfError::UnsupportedFormat(s.to_string())),
        }
    }

    /// 未知格式回退为 JPEG
    pub fn parse_or_default(s: Option<&str>) -> Self {
        s.and_then(|v| Self::parse(v).ok()).unwrap_or_default()
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
            ImageFormat::Tiff => "tiff",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::Tiff => "image/tiff",
        }
    }

    /// data URI: `data:image/<fmt>;base64,<data>`
    pub fn data_uri(&self, base64_data: &str) -> String {
        format!(
            "data:image/{};base64,{}",
            self.as_str().to_lowercase(),
            base64_data
        )
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 页面渲染参数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RenderOptions {
    pub format: ImageFormat,
    pub dpi: u32,
    pub quality: u8,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            format: ImageFormat::Jpeg,
            dpi: DEFAULT_DPI,
            quality: DEFAULT_QUALITY,
        }
    }
}

impl RenderOptions {
    pub fn new(format: ImageFormat, dpi: u32, quality: u32) -> Result<Self, PdfError> {
        if dpi == 0 || dpi > MAX_DPI {
            return Err(PdfError::InvalidDpi(dpi));
        }
        if quality == 0 || quality > 100 {
            return Err(PdfError::InvalidQuality(quality));
        }
        Ok(Self {
            format,
            dpi,
            quality: quality as u8,
        })
    }

    /// 缓存参数串，如 `page3_150dpi_jpeg_q80`
    pub fn artifact_params(&self, page_number: u32) -> String {
        format!(
            "page{}_{}dpi_{}_q{}",
            page_number,
            self.dpi,
            self.format.as_str().to_lowercase(),
            self.quality
        )
    }
}

/// 校验 1 起始的页码
pub fn check_page_number(page_number: u32, total_pages: usize) -> Result<(), PdfError> {
    if page_number == 0 || page_number as usize > total_pages {
        return Err(PdfError::PageOutOfRange {
            page: page_number,
            total: total_pages,
        });
    }
    Ok(())
}

/// PDF 基本信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdfInfo {
    pub total_pages: usize,
    pub metadata: BTreeMap<String, String>,
    pub file_size: u64,
    pub file_name: String,
}

/// PDF 目录结构
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdfStructure {
    pub outline: Vec<OutlineNode>,
}
