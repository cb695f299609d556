//! 认证服务错误类型定义
//!
//! 认证/鉴权失败统一以 `{"statusCode": .., "message": ..}` 返回，
//! 基础设施错误只记录日志，对外返回通用提示。

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use shop_shared::ShopError;

/// 认证服务错误类型
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    // 认证错误（401）
    #[error("Authorization token missing")]
    MissingCredential,
    #[error("Invalid authorization format")]
    MalformedCredential,
    #[error("Invalid token")]
    InvalidCredential,
    #[error("Token expired")]
    ExpiredCredential,
    #[error("Token has been revoked")]
    RevokedCredential,
    #[error("User not found")]
    PrincipalNotFound,

    // 鉴权错误（403）
    #[error("Insufficient permissions")]
    Forbidden,

    // 请求参数错误（400）
    #[error("{0}")]
    Validation(String),

    // 系统错误（500）
    #[error("基础设施错误: {0}")]
    Infrastructure(#[from] ShopError),
    #[error("内部错误: {0}")]
    Internal(String),
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, AuthError>;

/// 对外错误响应体
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    status_code: u16,
    message: String,
}

impl AuthError {
    /// 返回对应的 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingCredential
            | Self::MalformedCredential
            | Self::InvalidCredential
            | Self::ExpiredCredential
            | Self::RevokedCredential
            | Self::PrincipalNotFound => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Infrastructure(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 认证结果标签，用于 `auth_attempts_total` 指标
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::MissingCredential => "missing",
            Self::MalformedCredential => "malformed",
            Self::InvalidCredential => "invalid",
            Self::ExpiredCredential => "expired",
            Self::RevokedCredential => "revoked",
            Self::PrincipalNotFound => "not_found",
            Self::Forbidden => "forbidden",
            Self::Validation(_) => "bad_request",
            Self::Infrastructure(_) | Self::Internal(_) => "error",
        }
    }

    /// 对外可见的错误信息
    fn public_message(&self) -> String {
        match self {
            Self::Infrastructure(e) => {
                tracing::error!(error = %e, code = e.code(), "认证流程中的基础设施错误");
                "Internal Server Error".to_string()
            }
            Self::Internal(e) => {
                tracing::error!(error = %e, "认证流程中的未知错误");
                "Internal Server Error".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody {
            status_code: status.as_u16(),
            message: self.public_message(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<validator::ValidationErrors> for AuthError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}
