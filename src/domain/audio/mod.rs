//! Audio Context - 字节范围、播放参数、时间轴标记

mod errors;
mod value_objects;

pub use errors::AudioError;
pub use value_objects::{
    mime_type_for, speed_header_value, validate_markers, validate_speed, AudioInfo, AudioMarker,
    ByteRange, ChunkLayout, DEFAULT_CHUNK_SIZE, MAX_CHUNK_SIZE, SUPPORTED_EXTENSIONS,
};
