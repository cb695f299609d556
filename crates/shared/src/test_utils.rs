//! 测试工具模块
//!
//! 提供内存版缓存存储，支持 TTL、可控时钟和故障注入，
//! 用于在没有 Redis 的环境下测试连接管理、黑名单和认证流程。

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::cache::{CacheStore, StoreError};
use crate::config::RedisConfig;

/// 创建测试用 Redis 配置
///
/// 退避和健康检查间隔都压到毫秒级，避免测试等待过久
pub fn test_redis_config() -> RedisConfig {
    RedisConfig {
        url: std::env::var("TEST_REDIS_URL")
            .unwrap_or_else(|_| "redis://localhost:6379/1".to_string()),
        max_retries: 3,
        retry_base_delay_ms: 1,
        retry_max_delay_ms: 5,
        health_check_interval_ms: 50,
        operation_timeout_ms: 500,
    }
}

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

/// 待注入的故障
#[derive(Debug, Default)]
struct Faults {
    connect_failures: u32,
    connect_message: String,
    op_failures: u32,
    op_message: String,
}

/// 内存版缓存存储
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
    faults: Mutex<Faults>,
    /// 模拟时钟偏移
    clock_offset: Mutex<Duration>,
    latency: Mutex<Duration>,
    fail_pings: AtomicBool,
    closed: AtomicBool,
    connect_calls: AtomicU32,
    ping_calls: AtomicU32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 接下来 `count` 次 connect 返回错误
    pub fn fail_next_connects(&self, count: u32, message: &str) {
        let mut faults = self.faults.lock();
        faults.connect_failures = count;
        faults.connect_message = message.to_string();
    }

    /// 接下来 `count` 次 get/set/del 返回错误
    pub fn fail_next_ops(&self, count: u32, message: &str) {
        let mut faults = self.faults.lock();
        faults.op_failures = count;
        faults.op_message = message.to_string();
    }

    /// 控制 ping 是否失败
    pub fn fail_pings(&self, fail: bool) {
        self.fail_pings.store(fail, Ordering::SeqCst);
    }

    /// 为 get/set/del 增加人为延迟
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = latency;
    }

    /// 推进模拟时钟，用于验证 TTL 过期
    pub fn advance(&self, by: Duration) {
        *self.clock_offset.lock() += by;
    }

    pub fn connect_calls(&self) -> u32 {
        self.connect_calls.load(Ordering::SeqCst)
    }

    pub fn ping_calls(&self) -> u32 {
        self.ping_calls.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// 当前存活的键数量
    pub fn len(&self) -> usize {
        let now = self.now();
        self.entries
            .lock()
            .values()
            .filter(|e| e.expires_at.is_none_or(|at| at > now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 键的剩余 TTL（秒，向上取整）；不存在或无过期时间返回 None
    pub fn ttl_secs(&self, key: &str) -> Option<u64> {
        let now = self.now();
        let entries = self.entries.lock();
        let expires_at = entries.get(key)?.expires_at?;
        let remaining = expires_at.checked_duration_since(now)?;
        Some(remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0))
    }

    fn now(&self) -> Instant {
        Instant::now() + *self.clock_offset.lock()
    }

    /// 操作前置检查：延迟、关闭状态、故障注入
    async fn before_op(&self) -> Result<(), StoreError> {
        let latency = *self.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if self.is_closed() {
            return Err(StoreError::new("connection is closed"));
        }
        let mut faults = self.faults.lock();
        if faults.op_failures > 0 {
            faults.op_failures -= 1;
            return Err(StoreError::new(faults.op_message.clone()));
        }
        Ok(())
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn connect(&self) -> Result<(), StoreError> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        let mut faults = self.faults.lock();
        if faults.connect_failures > 0 {
            faults.connect_failures -= 1;
            return Err(StoreError::new(faults.connect_message.clone()));
        }
        self.closed.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.ping_calls.fetch_add(1, Ordering::SeqCst);
        if self.is_closed() {
            return Err(StoreError::new("connection is closed"));
        }
        if self.fail_pings.load(Ordering::SeqCst) {
            return Err(StoreError::new("PING failed"));
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.before_op().await?;
        let now = self.now();
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.expires_at.is_some_and(|at| at <= now) => {
                entries.remove(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: Option<u64>) -> Result<(), StoreError> {
        self.before_op().await?;
        if ttl_secs == Some(0) {
            // 与 Redis 一致：SET EX 0 是非法参数
            return Err(StoreError::new("ERR invalid expire time in 'set' command"));
        }
        let expires_at = ttl_secs.map(|secs| self.now() + Duration::from_secs(secs));
        self.entries.lock().insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), StoreError> {
        self.before_op().await?;
        self.entries.lock().remove(key);
        Ok(())
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
