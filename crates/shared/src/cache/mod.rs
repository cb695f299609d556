//! 缓存连接管理模块
//!
//! `CacheConnection` 维护到远端缓存的单一连接，负责：
//! - 启动时的存活探测与带退避的重试
//! - 对瞬时错误（只读副本）自动重连，同一时刻最多一个重连流程
//! - 后台定时健康检查（只记录日志和指标，不触发关闭）
//! - 优雅关闭：先停健康检查，再关闭连接
//!
//! 连接状态标志用原子变量维护，请求处理、健康检查和重连任务共享同一个句柄。

mod store;

pub use store::{CacheStore, RedisStore, StoreError};

#[cfg(test)]
pub use store::MockCacheStore;

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

use crate::config::RedisConfig;
use crate::error::{Result, ShopError};
use crate::observability::metrics;
use crate::retry::{ErrorClass, RetryPolicy, classify_error, retry_with_policy};

/// 健康状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// 健康检查结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub details: String,
}

/// 后台健康检查任务
struct HealthTask {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

struct Inner {
    store: Arc<dyn CacheStore>,
    policy: RetryPolicy,
    operation_timeout: Duration,
    health_check_interval: Duration,
    connected: AtomicBool,
    /// 重试耗尽后置位，进程重启前不再重连
    failed: AtomicBool,
    /// 单飞标记：初始化或重连进行中
    reconnecting: AtomicBool,
    /// 已收到关闭信号
    closed: AtomicBool,
    retry_count: AtomicU32,
    health_task: Mutex<Option<HealthTask>>,
}

/// 可共享的缓存连接句柄
#[derive(Clone)]
pub struct CacheConnection {
    inner: Arc<Inner>,
}

impl CacheConnection {
    /// 基于任意存储实现创建连接句柄（尚未连接）
    pub fn new(store: Arc<dyn CacheStore>, config: &RedisConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                policy: RetryPolicy::from_config(config),
                operation_timeout: config.operation_timeout(),
                health_check_interval: config.health_check_interval(),
                connected: AtomicBool::new(false),
                failed: AtomicBool::new(false),
                reconnecting: AtomicBool::new(false),
                closed: AtomicBool::new(false),
                retry_count: AtomicU32::new(0),
                health_task: Mutex::new(None),
            }),
        }
    }

    /// 创建 Redis 连接句柄
    pub fn redis(config: &RedisConfig) -> Result<Self> {
        let store = RedisStore::open(&config.url)
            .map_err(|e| ShopError::Connection(format!("invalid redis url: {}", e)))?;
        info!("Redis client created");
        Ok(Self::new(Arc::new(store), config))
    }

    /// 是否已连接
    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    /// 重试是否已耗尽
    pub fn is_failed(&self) -> bool {
        self.inner.failed.load(Ordering::SeqCst)
    }

    /// 最近一次连接流程的尝试次数
    pub fn retry_count(&self) -> u32 {
        self.inner.retry_count.load(Ordering::SeqCst)
    }

    /// 健康检查任务是否在运行
    pub fn health_check_running(&self) -> bool {
        self.inner.health_task.lock().is_some()
    }

    /// 初始化连接
    ///
    /// 成功后标记已连接并启动后台健康检查；失败时不启动健康检查。
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> Result<()> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(ShopError::NotConnected);
        }
        if self.is_failed() {
            return Err(ShopError::ConnectionFailed {
                attempts: self.retry_count(),
            });
        }
        if !self.begin_connect() {
            return Err(ShopError::Connection(
                "connection attempt already in progress".to_string(),
            ));
        }

        let result = self.establish("initialize").await;
        self.inner.reconnecting.store(false, Ordering::SeqCst);

        match result {
            Ok(()) => {
                info!(attempts = self.retry_count(), "缓存连接初始化成功");
                self.start_health_check();
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "缓存连接初始化失败");
                Err(e)
            }
        }
    }

    /// 读取
    #[instrument(skip(self))]
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        self.ensure_connection()?;
        let pending = self.inner.store.get(key);
        self.finish("GET", key, pending).await
    }

    /// 写入；`ttl_secs` 为 None 时不过期
    #[instrument(skip(self, value))]
    pub async fn set(&self, key: &str, value: &str, ttl_secs: Option<u64>) -> Result<()> {
        self.ensure_connection()?;
        let pending = self.inner.store.set(key, value, ttl_secs);
        self.finish("SET", key, pending).await
    }

    /// 删除
    #[instrument(skip(self))]
    pub async fn del(&self, key: &str) -> Result<()> {
        self.ensure_connection()?;
        let pending = self.inner.store.del(key);
        self.finish("DEL", key, pending).await
    }

    /// 存活探测
    pub async fn ping(&self) -> Result<()> {
        self.ensure_connection()?;
        match tokio::time::timeout(self.inner.operation_timeout, self.inner.store.ping()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                error!(error = %e, "Redis ping failed");
                Err(ShopError::Connection(format!("PING failed: {}", e)))
            }
            Err(_) => {
                error!("Redis ping timed out");
                Err(ShopError::Timeout {
                    operation: "PING",
                    key: "-".to_string(),
                })
            }
        }
    }

    /// 健康检查（供 HTTP 健康端点使用）
    pub async fn health_check(&self) -> HealthReport {
        match self.ping().await {
            Ok(()) => HealthReport {
                status: HealthStatus::Healthy,
                details: "Cache connection is healthy".to_string(),
            },
            Err(_) => HealthReport {
                status: HealthStatus::Unhealthy,
                details: "Cache connection is unhealthy".to_string(),
            },
        }
    }

    /// 优雅关闭
    ///
    /// 顺序：停止健康检查并等待其退出 → 标记断开 → 关闭连接。重复调用无副作用。
    pub async fn shutdown(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Gracefully shutting down cache connection");

        let task = self.inner.health_task.lock().take();
        if let Some(task) = task {
            let _ = task.shutdown_tx.send(true);
            if let Err(e) = task.handle.await {
                warn!(error = %e, "健康检查任务异常退出");
            }
        }

        self.set_connected(false, "shutdown");

        if let Err(e) = self.inner.store.close().await {
            warn!(error = %e, "关闭缓存连接时出错");
        }
        info!("Cache connection closed");
    }

    // ------------------------------------------------------------------
    // 内部实现
    // ------------------------------------------------------------------

    fn ensure_connection(&self) -> Result<()> {
        if self.is_connected() && !self.inner.closed.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ShopError::NotConnected)
        }
    }

    /// 抢占连接流程的单飞标记
    fn begin_connect(&self) -> bool {
        self.inner
            .reconnecting
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// 按重试策略建立连接，调用方需持有单飞标记
    async fn establish(&self, reason: &'static str) -> Result<()> {
        let inner: &Inner = &self.inner;
        inner.retry_count.store(0, Ordering::SeqCst);

        let result = retry_with_policy(
            &inner.policy,
            "cache_connect",
            ShopError::is_retryable,
            move || async move { inner.try_connect().await },
        )
        .await;

        match result {
            Ok(()) => {
                if inner.closed.load(Ordering::SeqCst) {
                    // 连接建立期间收到了关闭信号
                    let _ = inner.store.close().await;
                    return Err(ShopError::NotConnected);
                }
                self.set_connected(true, reason);
                Ok(())
            }
            Err(e) if e.is_retryable() => {
                let attempts = self.retry_count();
                inner.failed.store(true, Ordering::SeqCst);
                self.set_connected(false, "retries exhausted");
                self.stop_health_check();
                error!(
                    attempts,
                    max_retries = inner.policy.max_retries,
                    error = %e,
                    "Max cache connection retries exceeded, giving up until restart"
                );
                Err(ShopError::ConnectionFailed { attempts })
            }
            Err(e) => Err(e),
        }
    }

    /// 收尾单次操作：超时约束、错误日志、瞬时错误重连
    async fn finish<T, F>(&self, operation: &'static str, key: &str, pending: F) -> Result<T>
    where
        F: std::future::Future<Output = std::result::Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.inner.operation_timeout, pending).await {
            Ok(Ok(value)) => {
                metrics::record_cache_operation(operation, "ok");
                Ok(value)
            }
            Ok(Err(e)) => {
                metrics::record_cache_operation(operation, "error");
                error!(operation, key, error = %e, "缓存操作失败");
                self.handle_store_error(&e);
                Err(ShopError::Cache {
                    operation,
                    key: key.to_string(),
                    message: e.message,
                })
            }
            Err(_) => {
                metrics::record_cache_operation(operation, "timeout");
                error!(
                    operation,
                    key,
                    timeout_ms = self.inner.operation_timeout.as_millis() as u64,
                    "缓存操作超时"
                );
                Err(ShopError::Timeout {
                    operation,
                    key: key.to_string(),
                })
            }
        }
    }

    /// 根据错误分类决定是否自动重连，返回是否发起了重连
    fn handle_store_error(&self, err: &StoreError) -> bool {
        match classify_error(&err.message) {
            ErrorClass::Transient => {
                warn!(error = %err, "检测到瞬时错误，触发自动重连");
                self.schedule_reconnect().is_some()
            }
            ErrorClass::Permanent => false,
        }
    }

    /// 在后台发起一次重连；已有重连在进行、已关闭或已放弃时返回 None
    fn schedule_reconnect(&self) -> Option<JoinHandle<()>> {
        if self.inner.closed.load(Ordering::SeqCst) || self.is_failed() {
            return None;
        }
        if !self.begin_connect() {
            debug!("重连已在进行中，忽略本次触发");
            return None;
        }

        self.set_connected(false, "transient error");
        metrics::record_cache_reconnect("transient_error");

        let this = self.clone();
        Some(tokio::spawn(async move {
            match this.establish("reconnect").await {
                Ok(()) => info!(attempts = this.retry_count(), "缓存重连成功"),
                Err(e) => error!(error = %e, "缓存重连失败"),
            }
            this.inner.reconnecting.store(false, Ordering::SeqCst);
        }))
    }

    fn set_connected(&self, connected: bool, reason: &'static str) {
        let previous = self.inner.connected.swap(connected, Ordering::SeqCst);
        if previous == connected {
            return;
        }
        metrics::set_cache_connected(connected);
        if connected {
            info!(reason, "Successfully connected to cache");
        } else {
            warn!(reason, "Cache connection closed");
        }
    }

    /// 启动后台健康检查（重复调用只保留一个任务）
    fn start_health_check(&self) {
        let mut slot = self.inner.health_task.lock();
        if slot.is_some() {
            return;
        }

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let period = self.inner.health_check_interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(interval_ms = period.as_millis() as u64, "Starting cache health checker");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let Some(inner) = weak.upgrade() else { break };
                        CacheConnection { inner }.run_health_probe().await;
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("Cache health checker stopped");
        });

        *slot = Some(HealthTask {
            shutdown_tx,
            handle,
        });
    }

    /// 通知健康检查任务退出，不等待句柄；连接保持可用
    ///
    /// 收到关闭信号时调用，`shutdown` 在请求排空后再关闭连接。
    pub fn stop_health_check(&self) {
        if let Some(task) = self.inner.health_task.lock().take() {
            let _ = task.shutdown_tx.send(true);
            debug!("Cache health checker stop requested");
        }
    }

    async fn run_health_probe(&self) {
        if !self.is_connected() {
            warn!(failed = self.is_failed(), "缓存未连接，跳过本次健康检查");
            metrics::record_cache_health_check("skipped");
            return;
        }
        match self.ping().await {
            Ok(()) => {
                debug!("Cache health check passed");
                metrics::record_cache_health_check("ok");
            }
            Err(e) => {
                error!(error = %e, "Cache health check failed");
                metrics::record_cache_health_check("failed");
            }
        }
    }
}

impl Inner {
    /// 单次连接尝试：建立连接并做存活探测
    async fn try_connect(&self) -> Result<()> {
        let attempt = self.retry_count.fetch_add(1, Ordering::SeqCst) + 1;
        let probe = async {
            self.store.connect().await?;
            self.store.ping().await
        };

        match tokio::time::timeout(self.operation_timeout, probe).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                error!(attempt, error = %e, "Cache connection error");
                Err(ShopError::Connection(e.message))
            }
            Err(_) => {
                error!(attempt, "Cache connection attempt timed out");
                Err(ShopError::Connection("connection attempt timed out".to_string()))
            }
        }
    }
}
