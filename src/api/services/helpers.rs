//! API 帮助函数

use actix_web::http::StatusCode;
use actix_web::http::header::AUTHORIZATION;
use actix_web::{HttpRequest, HttpResponse};
use serde::Serialize;

use crate::errors::{MorphlinkError, Result};

use super::error_code::ErrorCode;
use super::types::ApiResponse;

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

/// 从 MorphlinkError 构建错误响应（自动映射 HTTP 状态码和 ErrorCode）
pub fn error_from_morphlink(err: &MorphlinkError) -> HttpResponse {
    error_response(err.http_status(), ErrorCode::from(err), err.message())
}

/// 统一 Result → HttpResponse 转换
pub fn api_result<T: Serialize>(result: Result<T>) -> HttpResponse {
    match result {
        Ok(data) => success_response(data),
        Err(e) => error_from_morphlink(&e),
    }
}

/// Capability wire error: `{kind, message}` with the mapped status
pub fn wire_error(err: &MorphlinkError) -> HttpResponse {
    HttpResponse::build(err.http_status()).json(err.to_wire())
}

/// Extract the token from `Authorization: Bearer <token>`
pub fn bearer_credential(req: &HttpRequest) -> Result<String> {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .ok_or_else(|| MorphlinkError::unauthorized("missing Authorization header"))?
        .to_str()
        .map_err(|_| MorphlinkError::unauthorized("malformed Authorization header"))?;

    let (scheme, token) = header
        .trim()
        .split_once(' ')
        .ok_or_else(|| MorphlinkError::unauthorized("expected a Bearer credential"))?;
    if !scheme.eq_ignore_ascii_case("bearer") || token.trim().is_empty() {
        return Err(MorphlinkError::unauthorized("expected a Bearer credential"));
    }
    Ok(token.trim().to_string())
}
