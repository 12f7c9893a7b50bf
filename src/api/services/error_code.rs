//! 统一 API 错误码定义

use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::errors::GeoTraceError;

/// API 错误码
///
/// 按千位分域：
/// - 0: 成功
/// - 1000-1099: 通用错误
/// - 2000-2099: 地理位置错误
/// - 3000-3099: 跟踪链接错误
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(i32)]
pub enum ErrorCode {
    Success = 0,

    // 通用错误 1000-1099
    BadRequest = 1000,
    Unauthorized = 1001,
    NotFound = 1004,
    InternalServerError = 1005,
    ServiceUnavailable = 1030,

    // 地理位置 2000-2099
    GeoIpUnavailable = 2000,

    // 跟踪链接 3000-3099
    LinkAlreadyExists = 3001,
}

impl From<&GeoTraceError> for ErrorCode {
    fn from(err: &GeoTraceError) -> Self {
        match err {
            GeoTraceError::Validation(_) => ErrorCode::BadRequest,
            GeoTraceError::NotFound(_) => ErrorCode::NotFound,
            GeoTraceError::Conflict(_) => ErrorCode::LinkAlreadyExists,
            GeoTraceError::Unauthorized(_) => ErrorCode::Unauthorized,
            GeoTraceError::GeoIpLookup(_) => ErrorCode::GeoIpUnavailable,
            GeoTraceError::DatabaseConnection(_) => ErrorCode::ServiceUnavailable,
            _ => ErrorCode::InternalServerError,
        }
    }
}
