//! 统一错误处理模块
//!
//! 定义基础设施层共享的错误类型，使用 thiserror 提供良好的错误信息。

use thiserror::Error;

/// 基础设施错误类型
#[derive(Debug, Error)]
pub enum ShopError {
    // ==================== 缓存连接错误 ====================
    #[error("缓存连接失败: {0}")]
    Connection(String),

    /// 连接尚未建立、正在重连或已关闭
    #[error("缓存连接未建立")]
    NotConnected,

    /// 重试次数耗尽，直到进程重启前不再自动重连
    #[error("缓存连接在 {attempts} 次尝试后放弃")]
    ConnectionFailed { attempts: u32 },

    // ==================== 缓存操作错误 ====================
    #[error("缓存操作失败: {operation} key={key}: {message}")]
    Cache {
        operation: &'static str,
        key: String,
        message: String,
    },

    #[error("缓存操作超时: {operation} key={key}")]
    Timeout { operation: &'static str, key: String },

    // ==================== 数据库错误 ====================
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    // ==================== 配置错误 ====================
    #[error("配置错误: {0}")]
    Config(#[from] config::ConfigError),

    // ==================== 通用错误 ====================
    #[error("内部错误: {0}")]
    Internal(String),
}

/// 错误结果类型别名
pub type Result<T> = std::result::Result<T, ShopError>;

impl ShopError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::Connection(_) => "CACHE_CONNECTION_ERROR",
            Self::NotConnected => "CACHE_NOT_CONNECTED",
            Self::ConnectionFailed { .. } => "CACHE_CONNECTION_FAILED",
            Self::Cache { .. } => "CACHE_ERROR",
            Self::Timeout { .. } => "CACHE_TIMEOUT",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 是否为可重试错误
    ///
    /// `ConnectionFailed` 表示重试已耗尽，`NotConnected` 需要等待连接恢复，二者都不在此列。
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::Cache { .. } | Self::Timeout { .. } | Self::Database(_)
        )
    }
}
