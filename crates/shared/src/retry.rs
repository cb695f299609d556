//! 重试策略与错误分类
//!
//! 缓存连接的重连策略：第 N 次失败后等待 `N * base_delay`，不超过 `max_delay`，
//! 累计失败达到 `max_retries` 次后放弃。
//! 是否需要"出错即重连"由 `classify_error` 决定，与存储端的具体错误文本解耦。

use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};

use crate::config::RedisConfig;
use crate::error::ShopError;

// ---------------------------------------------------------------------------
// RetryPolicy：重试策略配置
// ---------------------------------------------------------------------------

/// 重试策略配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 最大失败次数（含首次尝试）
    pub max_retries: u32,
    /// 退避步长
    pub base_delay: Duration,
    /// 退避时间上限
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    /// 默认策略：最多 10 次，步长 100ms，上限 5 秒
    fn default() -> Self {
        Self {
            max_retries: 10,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(5000),
        }
    }
}

impl RetryPolicy {
    /// 从 Redis 配置构建
    pub fn from_config(config: &RedisConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            max_delay: Duration::from_millis(config.retry_max_delay_ms),
        }
    }

    /// 计算第 N 次失败后的等待时间（attempt 从 1 开始）
    ///
    /// 公式: attempt * base_delay，结果不超过 max_delay。
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.base_delay
            .checked_mul(attempt)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }

    /// 已失败 `failed_attempts` 次后是否继续，继续则返回等待时间
    pub fn next_delay(&self, failed_attempts: u32) -> Option<Duration> {
        if failed_attempts >= self.max_retries {
            None
        } else {
            Some(self.delay_for_attempt(failed_attempts))
        }
    }
}

// ---------------------------------------------------------------------------
// 错误分类
// ---------------------------------------------------------------------------

/// 存储错误分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// 预期会自行恢复（如只读副本切换），应自动重连
    Transient,
    /// 其余错误，不触发重连
    Permanent,
}

/// 只读副本状态的错误标记
const TRANSIENT_MARKERS: &[&str] = &["READONLY", "READ-ONLY", "READ_ONLY"];

/// 对存储返回的错误信息分类
pub fn classify_error(message: &str) -> ErrorClass {
    let upper = message.to_ascii_uppercase();
    if TRANSIENT_MARKERS.iter().any(|m| upper.contains(m)) {
        ErrorClass::Transient
    } else {
        ErrorClass::Permanent
    }
}

// ---------------------------------------------------------------------------
// retry_with_policy：带重试的异步执行器
// ---------------------------------------------------------------------------

/// 带重试的异步执行器
///
/// 每次失败后都会询问 `policy.next_delay`；不可重试的错误直接向上传播。
/// 重试耗尽时返回最后一次的错误。
pub async fn retry_with_policy<F, Fut, T>(
    policy: &RetryPolicy,
    operation_name: &str,
    is_retryable: impl Fn(&ShopError) -> bool,
    mut operation: F,
) -> Result<T, ShopError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ShopError>>,
{
    let mut failed: u32 = 0;

    loop {
        match operation().await {
            Ok(value) => {
                if failed > 0 {
                    info!(operation = operation_name, failed, "操作在重试后成功");
                }
                return Ok(value);
            }
            Err(err) => {
                if !is_retryable(&err) {
                    warn!(operation = operation_name, error = %err, "操作失败且不可重试");
                    return Err(err);
                }

                failed += 1;
                let Some(delay) = policy.next_delay(failed) else {
                    warn!(
                        operation = operation_name,
                        failed,
                        max_retries = policy.max_retries,
                        error = %err,
                        "已达最大重试次数，放弃重试"
                    );
                    return Err(err);
                };

                warn!(
                    operation = operation_name,
                    failed,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "操作失败，将在退避后重试"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// 单元测试
// ---------------------------------------------------------------------------
