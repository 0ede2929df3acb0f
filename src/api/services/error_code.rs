//! 统一 API 错误码定义

use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::errors::MorphlinkError;

/// API 错误码枚举
///
/// 使用 serde_repr 序列化为数字。按千位分域：
/// - 0: 成功
/// - 1000-1099: 通用错误
/// - 2000-2099: 认证错误
/// - 3000-3099: 链接错误
/// - 7000-7099: 能力调用错误
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(i32)]
pub enum ErrorCode {
    // 成功
    Success = 0,

    // 通用错误 1000-1099
    BadRequest = 1000,
    InternalServerError = 1005,

    // 认证错误 2000-2099
    AuthFailed = 2000,
    Forbidden = 2005,

    // 链接错误 3000-3099
    LinkNotFound = 3000,
    LinkAlreadyExists = 3001,
    CodeGenerationExhausted = 3007,

    // 能力调用错误 7000-7099
    CapabilityUnreachable = 7000,
    CapabilityTimeout = 7001,
    UnknownCapability = 7002,
}

impl From<&MorphlinkError> for ErrorCode {
    fn from(err: &MorphlinkError) -> Self {
        match err {
            MorphlinkError::NotFound(_) => ErrorCode::LinkNotFound,
            MorphlinkError::Forbidden(_) => ErrorCode::Forbidden,
            MorphlinkError::Unauthorized(_) => ErrorCode::AuthFailed,
            MorphlinkError::InvalidRequest(_) => ErrorCode::BadRequest,
            MorphlinkError::Conflict(_) => ErrorCode::LinkAlreadyExists,
            MorphlinkError::CodeGenerationExhausted(_) => ErrorCode::CodeGenerationExhausted,
            MorphlinkError::Unreachable(_) => ErrorCode::CapabilityUnreachable,
            MorphlinkError::Timeout(_) => ErrorCode::CapabilityTimeout,
            MorphlinkError::UnknownCapability(_) => ErrorCode::UnknownCapability,
            MorphlinkError::Internal(_) => ErrorCode::InternalServerError,
        }
    }
}
