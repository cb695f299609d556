//! 请求和响应 DTO

use serde::{Deserialize, Serialize};
use validator::Validate;

/// 管理员吊销 Token 请求
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RevokeTokenRequest {
    #[validate(length(min = 1, max = 4096, message = "token 长度必须在 1-4096 之间"))]
    pub token: String,
}

/// 吊销结果
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RevokeResponse {
    /// 是否写入了黑名单（已过期的 Token 不写入）
    pub revoked: bool,
    /// 黑名单条目的存活时间（秒）
    pub ttl_secs: Option<u64>,
}

impl RevokeResponse {
    pub fn revoked(ttl_secs: u64) -> Self {
        Self {
            revoked: true,
            ttl_secs: Some(ttl_secs),
        }
    }

    pub fn skipped() -> Self {
        Self {
            revoked: false,
            ttl_secs: None,
        }
    }
}

/// 就绪探针结果
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub checks: ReadinessChecks,
}

#[derive(Debug, Serialize)]
pub struct ReadinessChecks {
    pub cache: &'static str,
    pub database: &'static str,
}
