//! PDF Adapters - pdfium 读取器与 poppler 光栅化器

mod pdfium_reader;
mod poppler_rasterizer;

pub use pdfium_reader::{PdfiumReader, PdfiumReaderConfig};
pub use poppler_rasterizer::{PopplerRasterizer, PopplerRasterizerConfig};
