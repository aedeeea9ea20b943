//! HTTP Layer - RESTful API + 媒体文件

pub mod dto;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;


pub use error::ApiError;
pub use extractors::OptionalJson;
pub use routes::create_routes;
pub use server::{HttpServer, ServerConfig};
pub use state::{AppState, MediaSettings, RequestDefaults};
