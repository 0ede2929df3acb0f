use std::fmt;

use actix_web::http::StatusCode;
use serde::{Deserialize, Serialize};

/// Wire-level error kind, carried as `{kind, message}` between processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Forbidden,
    Unauthorized,
    InvalidRequest,
    Conflict,
    CodeGenerationExhausted,
    Unreachable,
    Timeout,
    UnknownCapability,
    Internal,
}

/// Structured error body returned by capability endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MorphlinkError {
    NotFound(String),
    Forbidden(String),
    Unauthorized(String),
    InvalidRequest(String),
    Conflict(String),
    CodeGenerationExhausted(String),
    Unreachable(String),
    Timeout(String),
    UnknownCapability(String),
    Internal(String),
}

impl MorphlinkError {
    /// 获取错误类型名称
    pub fn error_type(&self) -> &'static str {
        match self {
            MorphlinkError::NotFound(_) => "Resource Not Found",
            MorphlinkError::Forbidden(_) => "Forbidden",
            MorphlinkError::Unauthorized(_) => "Unauthorized",
            MorphlinkError::InvalidRequest(_) => "Invalid Request",
            MorphlinkError::Conflict(_) => "Conflict",
            MorphlinkError::CodeGenerationExhausted(_) => "Code Generation Exhausted",
            MorphlinkError::Unreachable(_) => "Capability Unreachable",
            MorphlinkError::Timeout(_) => "Capability Timeout",
            MorphlinkError::UnknownCapability(_) => "Unknown Capability",
            MorphlinkError::Internal(_) => "Internal Error",
        }
    }

    /// 获取错误详情
    pub fn message(&self) -> &str {
        match self {
            MorphlinkError::NotFound(msg)
            | MorphlinkError::Forbidden(msg)
            | MorphlinkError::Unauthorized(msg)
            | MorphlinkError::InvalidRequest(msg)
            | MorphlinkError::Conflict(msg)
            | MorphlinkError::CodeGenerationExhausted(msg)
            | MorphlinkError::Unreachable(msg)
            | MorphlinkError::Timeout(msg)
            | MorphlinkError::UnknownCapability(msg)
            | MorphlinkError::Internal(msg) => msg,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            MorphlinkError::NotFound(_) => ErrorKind::NotFound,
            MorphlinkError::Forbidden(_) => ErrorKind::Forbidden,
            MorphlinkError::Unauthorized(_) => ErrorKind::Unauthorized,
            MorphlinkError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            MorphlinkError::Conflict(_) => ErrorKind::Conflict,
            MorphlinkError::CodeGenerationExhausted(_) => ErrorKind::CodeGenerationExhausted,
            MorphlinkError::Unreachable(_) => ErrorKind::Unreachable,
            MorphlinkError::Timeout(_) => ErrorKind::Timeout,
            MorphlinkError::UnknownCapability(_) => ErrorKind::UnknownCapability,
            MorphlinkError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Rebuild an error received over the wire
    pub fn from_wire(body: ErrorBody) -> Self {
        let msg = body.message;
        match body.kind {
            ErrorKind::NotFound => MorphlinkError::NotFound(msg),
            ErrorKind::Forbidden => MorphlinkError::Forbidden(msg),
            ErrorKind::Unauthorized => MorphlinkError::Unauthorized(msg),
            ErrorKind::InvalidRequest => MorphlinkError::InvalidRequest(msg),
            ErrorKind::Conflict => MorphlinkError::Conflict(msg),
            ErrorKind::CodeGenerationExhausted => MorphlinkError::CodeGenerationExhausted(msg),
            ErrorKind::Unreachable => MorphlinkError::Unreachable(msg),
            ErrorKind::Timeout => MorphlinkError::Timeout(msg),
            ErrorKind::UnknownCapability => MorphlinkError::UnknownCapability(msg),
            ErrorKind::Internal => MorphlinkError::Internal(msg),
        }
    }

    pub fn to_wire(&self) -> ErrorBody {
        ErrorBody {
            kind: self.kind(),
            message: self.message().to_string(),
        }
    }

    /// HTTP 状态码映射
    pub fn http_status(&self) -> StatusCode {
        match self {
            MorphlinkError::NotFound(_) | MorphlinkError::UnknownCapability(_) => {
                StatusCode::NOT_FOUND
            }
            MorphlinkError::Forbidden(_) => StatusCode::FORBIDDEN,
            MorphlinkError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            MorphlinkError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            MorphlinkError::Conflict(_) => StatusCode::CONFLICT,
            MorphlinkError::CodeGenerationExhausted(_) => StatusCode::SERVICE_UNAVAILABLE,
            MorphlinkError::Unreachable(_) => StatusCode::BAD_GATEWAY,
            MorphlinkError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            MorphlinkError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 格式化为简洁输出
    pub fn format_simple(&self) -> String {
        format!("{}: {}", self.error_type(), self.message())
    }
}

impl fmt::Display for MorphlinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_simple())
    }
}

impl std::error::Error for MorphlinkError {}

// 便捷的构造函数
impl MorphlinkError {
    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        MorphlinkError::NotFound(msg.into())
    }

    pub fn forbidden<T: Into<String>>(msg: T) -> Self {
        MorphlinkError::Forbidden(msg.into())
    }

    pub fn unauthorized<T: Into<String>>(msg: T) -> Self {
        MorphlinkError::Unauthorized(msg.into())
    }

    pub fn invalid_request<T: Into<String>>(msg: T) -> Self {
        MorphlinkError::InvalidRequest(msg.into())
    }

    pub fn conflict<T: Into<String>>(msg: T) -> Self {
        MorphlinkError::Conflict(msg.into())
    }

    pub fn code_generation_exhausted<T: Into<String>>(msg: T) -> Self {
        MorphlinkError::CodeGenerationExhausted(msg.into())
    }

    pub fn unreachable<T: Into<String>>(msg: T) -> Self {
        MorphlinkError::Unreachable(msg.into())
    }

    pub fn timeout<T: Into<String>>(msg: T) -> Self {
        MorphlinkError::Timeout(msg.into())
    }

    pub fn unknown_capability<T: Into<String>>(msg: T) -> Self {
        MorphlinkError::UnknownCapability(msg.into())
    }

    pub fn internal<T: Into<String>>(msg: T) -> Self {
        MorphlinkError::Internal(msg.into())
    }
}

impl From<serde_json::Error> for MorphlinkError {
    fn from(err: serde_json::Error) -> Self {
        MorphlinkError::InvalidRequest(format!("payload serialization failed: {}", err))
    }
}

impl From<std::io::Error> for MorphlinkError {
    fn from(err: std::io::Error) -> Self {
        MorphlinkError::Internal(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MorphlinkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_roundtrip_keeps_kind_and_message() {
        let err = MorphlinkError::forbidden("link 'abc' belongs to another owner");
        let body = err.to_wire();
        assert_eq!(body.kind, ErrorKind::Forbidden);

        let json = serde_json::to_string(&body).unwrap();
        assert!(json.contains("\"kind\":\"forbidden\""), "got: {}", json);

        let back: ErrorBody = serde_json::from_str(&json).unwrap();
        assert_eq!(MorphlinkError::from_wire(back), err);
    }

    #[test]
    fn test_forbidden_and_not_found_have_distinct_statuses() {
        assert_eq!(
            MorphlinkError::forbidden("x").http_status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            MorphlinkError::not_found("x").http_status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            MorphlinkError::timeout("x").http_status(),
            StatusCode::GATEWAY_TIMEOUT
        );
    }

    #[test]
    fn test_format_simple() {
        let err = MorphlinkError::not_found("short code 'zz' not found");
        assert_eq!(
            err.format_simple(),
            "Resource Not Found: short code 'zz' not found"
        );
        assert_eq!(err.to_string(), err.format_simple());
    }
}
