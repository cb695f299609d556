//! 缓存存储抽象
//!
//! `CacheConnection` 只依赖 `CacheStore` 这一窄接口，便于替换为内存实现或 mock。

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use tokio::sync::RwLock;
use tracing::debug;

/// 存储层返回的原始错误
///
/// 只保留错误文本，是否需要重连由 `retry::classify_error` 判断。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct StoreError {
    pub message: String,
}

impl StoreError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        // kind 的 Debug 名称（如 ReadOnly）和服务端错误码一起保留
        Self::new(format!("{:?}: {}", err.kind(), err))
    }
}

/// 支持 TTL 的键值存储
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// 建立（或重新建立）连接
    async fn connect(&self) -> Result<(), StoreError>;

    /// 存活探测
    async fn ping(&self) -> Result<(), StoreError>;

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// 写入；`ttl_secs` 为 None 时不设置过期
    async fn set(&self, key: &str, value: &str, ttl_secs: Option<u64>) -> Result<(), StoreError>;

    async fn del(&self, key: &str) -> Result<(), StoreError>;

    /// 关闭连接
    async fn close(&self) -> Result<(), StoreError>;
}

/// 基于 Redis 的存储实现
pub struct RedisStore {
    client: Client,
    conn: RwLock<Option<MultiplexedConnection>>,
}

impl RedisStore {
    /// 创建 Redis 客户端（此时不建立连接）
    pub fn open(url: &str) -> Result<Self, StoreError> {
        let client = Client::open(url)?;
        Ok(Self {
            client,
            conn: RwLock::new(None),
        })
    }

    async fn conn(&self) -> Result<MultiplexedConnection, StoreError> {
        self.conn
            .read()
            .await
            .clone()
            .ok_or_else(|| StoreError::new("redis connection is closed"))
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn connect(&self) -> Result<(), StoreError> {
        let conn = self.client.get_multiplexed_async_connection().await?;
        *self.conn.write().await = Some(conn);
        debug!("Redis multiplexed connection established");
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn().await?;
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: Option<u64>) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        match ttl_secs {
            Some(secs) => {
                let _: () = conn.set_ex(key, value, secs).await?;
            }
            None => {
                let _: () = conn.set(key, value).await?;
            }
        }
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        let _: () = conn.del(key).await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), StoreError> {
        // MultiplexedConnection 在最后一个句柄释放时关闭底层连接
        self.conn.write().await.take();
        Ok(())
    }
}
