//! API 响应帮助函数

use actix_web::HttpResponse;
use actix_web::http::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::errors::GeoTraceError;

use super::error_code::ErrorCode;

/// 统一响应信封
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

/// 构建 JSON 响应
pub fn json_response<T: Serialize>(
    status: StatusCode,
    code: ErrorCode,
    message: impl Into<String>,
    data: Option<T>,
) -> HttpResponse {
    HttpResponse::build(status)
        .append_header(("Content-Type", "application/json; charset=utf-8"))
        .json(ApiResponse {
            code: code as i32,
            message: message.into(),
            data,
        })
}

/// 构建成功响应
pub fn success_response<T: Serialize>(data: T) -> HttpResponse {
    json_response(StatusCode::OK, ErrorCode::Success, "OK", Some(data))
}

/// 构建错误响应
pub fn error_response(status: StatusCode, error_code: ErrorCode, message: &str) -> HttpResponse {
    json_response::<()>(status, error_code, message, None)
}

/// 从 GeoTraceError 构建错误响应
///
/// 服务端错误只返回通用消息，细节写日志
pub fn error_from_geotrace(err: &GeoTraceError) -> HttpResponse {
    let status = err.http_status();
    if status.is_server_error() {
        error!("API request failed: {}", err);
    } else {
        debug!("API request rejected: {}", err);
    }
    error_response(status, ErrorCode::from(err), err.public_message())
}

/// 统一 Result → HttpResponse 转换
pub fn api_result<T, E>(result: Result<T, E>) -> HttpResponse
where
    T: Serialize,
    E: Into<GeoTraceError>,
{
    match result {
        Ok(data) => success_response(data),
        Err(e) => error_from_geotrace(&e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[actix_rt::test]
    async fn test_api_result_hides_internal_details() {
        let resp = api_result::<(), _>(Err(GeoTraceError::database_operation(
            "no such table: secret",
        )));
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = to_bytes(resp.into_body()).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["code"], ErrorCode::InternalServerError as i32);
        assert_eq!(value["message"], "Internal server error");
        assert!(value.get("data").is_none());
    }

    #[actix_rt::test]
    async fn test_success_envelope() {
        let resp = success_response(vec![1, 2, 3]);
        assert_eq!(resp.status(), StatusCode::OK);
        let body = to_bytes(resp.into_body()).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["code"], 0);
        assert_eq!(value["data"], serde_json::json!([1, 2, 3]));
    }
}
