//! Data Transfer Objects

use serde::Serialize;
use std::str::FromStr;

use super::error::ApiError;

// ============================================================================
// 统一响应结构
// ============================================================================

/// 统一 API 响应格式
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub errno: i32,
    pub error: String,
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    /// 成功响应
    pub fn success(data: T) -> Self {
        Self {
            errno: 0,
            error: String::new(),
            data: Some(data),
        }
    }
}

/// 任务入队响应
#[derive(Debug, Serialize)]
pub struct TaskAccepted {
    pub task_id: String,
    pub message: String,
}

// ============================================================================
// 查询参数解析
// ============================================================================

/// 解析可选查询参数，缺省时使用默认值
pub fn parse_param<T: FromStr>(name: &str, raw: Option<&str>, default: T) -> Result<T, ApiError> {
    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(default),
        Some(value) => value
            .parse()
            .map_err(|_| ApiError::BadRequest(format!("Invalid value for {}: {}", name, value))),
    }
}

/// 布尔参数，只认 `true` / `1`（大小写不敏感）
pub fn parse_flag(raw: Option<&str>, default: bool) -> bool {
    match raw.map(|v| v.trim().to_lowercase()) {
        None => default,
        Some(v) if v.is_empty() => default,
        Some(v) => v == "true" || v == "1",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_param() {
        assert_eq!(parse_param::<u32>("page", None, 1).unwrap(), 1);
        assert_eq!(parse_param::<u32>("page", Some(" 7 "), 1).unwrap(), 7);
        assert!(parse_param::<u32>("page", Some("-1"), 1).is_err());
        assert!(parse_param::<f64>("speed", Some("fast"), 1.0).is_err());
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag(None, true));
        assert!(!parse_flag(Some("false"), true));
        assert!(parse_flag(Some("True"), false));
        assert!(!parse_flag(Some("yes"), false));
    }
}
