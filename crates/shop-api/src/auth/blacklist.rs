//! Token 黑名单
//!
//! 被吊销的 Token 以 `{prefix}{sha256(token)}` 为键写入缓存，
//! TTL 等于 Token 的剩余有效期，过期后由缓存自动清除。

use sha2::{Digest, Sha256};
use shop_shared::{CacheConnection, Result};
use tracing::{debug, info};

/// 黑名单标记值
pub const REVOKED_MARKER: &str = "revoked";

#[derive(Clone)]
pub struct TokenBlacklist {
    cache: CacheConnection,
    prefix: String,
}

impl TokenBlacklist {
    pub fn new(cache: CacheConnection, prefix: impl Into<String>) -> Self {
        Self {
            cache,
            prefix: prefix.into(),
        }
    }

    /// Token 对应的缓存键，日志中只会出现摘要
    pub fn key_for(&self, token: &str) -> String {
        format!("{}{:x}", self.prefix, Sha256::digest(token.as_bytes()))
    }

    /// 吊销 Token
    ///
    /// `remaining_ttl_secs <= 0` 表示 Token 已过期，不写入，返回 false。
    pub async fn revoke(&self, token: &str, remaining_ttl_secs: i64) -> Result<bool> {
        let ttl = match u64::try_from(remaining_ttl_secs) {
            Ok(ttl) if ttl > 0 => ttl,
            _ => {
                debug!(remaining_ttl_secs, "Token 已过期，无需加入黑名单");
                return Ok(false);
            }
        };

        let key = self.key_for(token);
        self.cache.set(&key, REVOKED_MARKER, Some(ttl)).await?;
        info!(key = %key, ttl_secs = ttl, "Token 已加入黑名单");
        Ok(true)
    }

    /// Token 是否已被吊销；缓存错误原样返回，由调用方决定放行策略
    pub async fn is_revoked(&self, token: &str) -> Result<bool> {
        Ok(self.cache.get(&self.key_for(token)).await?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shop_shared::ShopError;
    use shop_shared::test_utils::{MemoryStore, test_redis_config};
    use std::sync::Arc;
    use std::time::Duration;

    async fn setup() -> (Arc<MemoryStore>, CacheConnection, TokenBlacklist) {
        let store = Arc::new(MemoryStore::new());
        let cache = CacheConnection::new(store.clone(), &test_redis_config());
        cache.initialize().await.unwrap();
        let blacklist = TokenBlacklist::new(cache.clone(), "bl_");
        (store, cache, blacklist)
    }

    #[tokio::test]
    async fn test_key_is_hashed_and_namespaced() {
        let (_, cache, blacklist) = setup().await;
        let key = blacklist.key_for("abc");
        assert_eq!(
            key,
            "bl_ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert!(!key.contains("abc"));
        cache.shutdown().await;
    }

    #[tokio::test]
    async fn test_revoke_sets_ttl_to_remaining_lifetime() {
        let (store, cache, blacklist) = setup().await;

        assert!(blacklist.revoke("token-a", 90).await.unwrap());
        assert!(blacklist.is_revoked("token-a").await.unwrap());
        assert!(!blacklist.is_revoked("token-b").await.unwrap());
        assert_eq!(store.ttl_secs(&blacklist.key_for("token-a")), Some(90));

        // 过期后自动失效
        store.advance(Duration::from_secs(91));
        assert!(!blacklist.is_revoked("token-a").await.unwrap());

        cache.shutdown().await;
    }

    #[tokio::test]
    async fn test_revoke_with_non_positive_ttl_is_noop() {
        let (store, cache, blacklist) = setup().await;

        assert!(!blacklist.revoke("token-a", 0).await.unwrap());
        assert!(!blacklist.revoke("token-a", -30).await.unwrap());
        assert!(!blacklist.is_revoked("token-a").await.unwrap());
        assert!(store.is_empty());

        // 已吊销的 Token 不受零 TTL 调用影响
        blacklist.revoke("token-b", 60).await.unwrap();
        blacklist.revoke("token-b", 0).await.unwrap();
        assert!(blacklist.is_revoked("token-b").await.unwrap());

        cache.shutdown().await;
    }

    #[tokio::test]
    async fn test_lookup_error_is_propagated() {
        let (store, cache, blacklist) = setup().await;

        store.fail_next_ops(1, "ERR something broke");
        let err = blacklist.is_revoked("token-a").await.unwrap_err();
        assert!(matches!(err, ShopError::Cache { operation: "GET", .. }));

        cache.shutdown().await;
    }
}
