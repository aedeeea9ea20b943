//! PDF Context - PDF 文档信息、渲染参数与目录结构

mod errors;
mod outline;
mod value_objects;

pub use errors::PdfError;
pub use outline::{flatten_outline, OutlineNode, RawOutlineItem};
pub use value_objects::{
    check_page_number, ImageFormat, PdfInfo, PdfStructure, RenderOptions, DEFAULT_DPI,
    DEFAULT_QUALITY, MAX_DPI,
};
