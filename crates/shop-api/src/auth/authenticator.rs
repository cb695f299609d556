//! Bearer Token 认证
//!
//! 把原始 `Authorization` 头转换为已验证的主体或具体的失败原因：
//! 1. 缺少请求头 → `MissingCredential`
//! 2. 格式不是 `Bearer <token>` → `MalformedCredential`
//! 3. 黑名单命中 → `RevokedCredential`（查询失败时拒绝请求）
//! 4. 签名/过期校验 → `ExpiredCredential` / `InvalidCredential`
//! 5. 用户不存在 → `PrincipalNotFound`

use std::sync::Arc;

use tracing::{debug, error, warn};

use super::blacklist::TokenBlacklist;
use super::jwt::{JwtManager, VerifyOutcome};
use super::principal::{AuthContext, Principal};
use crate::error::{AuthError, Result};
use crate::repository::UserLookup;

/// 解析 `Authorization` 头，返回 Token 部分
///
/// 只接受恰好两段：`Bearer a b` 这类多出空格分段的头视为格式错误，不截取第一段。
pub fn parse_authorization(header: Option<&str>) -> Result<&str> {
    let header = header.ok_or(AuthError::MissingCredential)?;
    let (scheme, token) = header
        .split_once(' ')
        .ok_or(AuthError::MalformedCredential)?;

    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() || token.contains(' ') {
        return Err(AuthError::MalformedCredential);
    }
    Ok(token)
}

#[derive(Clone)]
pub struct TokenAuthenticator {
    jwt: Arc<JwtManager>,
    blacklist: TokenBlacklist,
    users: Arc<dyn UserLookup>,
}

impl TokenAuthenticator {
    pub fn new(jwt: Arc<JwtManager>, blacklist: TokenBlacklist, users: Arc<dyn UserLookup>) -> Self {
        Self {
            jwt,
            blacklist,
            users,
        }
    }

    /// 认证一次请求
    pub async fn authenticate(&self, header: Option<&str>) -> Result<AuthContext> {
        let token = parse_authorization(header)?;

        // 安全相关：黑名单不可用时拒绝，而不是放行
        match self.blacklist.is_revoked(token).await {
            Ok(false) => {}
            Ok(true) => {
                debug!("Token 已被吊销");
                return Err(AuthError::RevokedCredential);
            }
            Err(e) => {
                error!(error = %e, "黑名单查询失败，拒绝请求");
                return Err(AuthError::Infrastructure(e));
            }
        }

        let claims = match self.jwt.verify(token) {
            VerifyOutcome::Valid(claims) => claims,
            VerifyOutcome::Expired => return Err(AuthError::ExpiredCredential),
            VerifyOutcome::InvalidSignature | VerifyOutcome::Malformed => {
                return Err(AuthError::InvalidCredential);
            }
        };

        let record = self
            .users
            .find_by_id(&claims.id)
            .await?
            .ok_or(AuthError::PrincipalNotFound)?;

        let principal = Principal::try_from(record).map_err(|e| {
            warn!(user_id = %claims.id, error = %e, "用户角色无法识别");
            AuthError::Internal(e.to_string())
        })?;

        Ok(AuthContext {
            principal,
            token: token.to_string(),
            expires_at: claims.exp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Claims, PrincipalRecord, Role};
    use crate::repository::{InMemoryUserLookup, MockUserLookup};
    use chrono::Utc;
    use shop_shared::config::AuthConfig;
    use shop_shared::test_utils::{MemoryStore, test_redis_config};
    use shop_shared::{CacheConnection, ShopError};

    struct Fixture {
        store: Arc<MemoryStore>,
        cache: CacheConnection,
        jwt: Arc<JwtManager>,
        blacklist: TokenBlacklist,
    }

    impl Fixture {
        async fn new() -> Self {
            let store = Arc::new(MemoryStore::new());
            let cache = CacheConnection::new(store.clone(), &test_redis_config());
            cache.initialize().await.unwrap();
            let jwt = Arc::new(JwtManager::new(&AuthConfig::default()).unwrap());
            let blacklist = TokenBlacklist::new(cache.clone(), "bl_");
            Self {
                store,
                cache,
                jwt,
                blacklist,
            }
        }

        fn authenticator(&self, users: Arc<dyn UserLookup>) -> TokenAuthenticator {
            TokenAuthenticator::new(self.jwt.clone(), self.blacklist.clone(), users)
        }

        fn bearer(&self, user_id: &str) -> (String, String) {
            let (token, _) = self.jwt.issue(user_id).unwrap();
            (format!("Bearer {}", token), token)
        }
    }

    #[test]
    fn test_parse_authorization() {
        assert!(matches!(
            parse_authorization(None),
            Err(AuthError::MissingCredential)
        ));
        assert!(matches!(
            parse_authorization(Some("Basic xyz")),
            Err(AuthError::MalformedCredential)
        ));
        assert!(matches!(
            parse_authorization(Some("Bearer")),
            Err(AuthError::MalformedCredential)
        ));
        assert!(matches!(
            parse_authorization(Some("Bearer ")),
            Err(AuthError::MalformedCredential)
        ));
        assert!(matches!(
            parse_authorization(Some("Bearer a b")),
            Err(AuthError::MalformedCredential)
        ));
        assert_eq!(parse_authorization(Some("bearer abc")).unwrap(), "abc");
        assert_eq!(parse_authorization(Some("BEARER abc")).unwrap(), "abc");
    }

    #[tokio::test]
    async fn test_valid_token_resolves_principal() {
        let fx = Fixture::new().await;
        let users = Arc::new(InMemoryUserLookup::new().with_user("u-1", Role::Seller));
        let (header, token) = fx.bearer("u-1");

        let ctx = fx.authenticator(users).authenticate(Some(&header)).await.unwrap();
        assert_eq!(
            ctx.principal,
            Principal {
                id: "u-1".to_string(),
                role: Role::Seller
            }
        );
        assert_eq!(ctx.token, token);
        fx.cache.shutdown().await;
    }

    #[tokio::test]
    async fn test_revoked_token_is_rejected() {
        let fx = Fixture::new().await;
        let users = Arc::new(InMemoryUserLookup::new().with_user("u-1", Role::Admin));
        let (header, token) = fx.bearer("u-1");
        fx.blacklist.revoke(&token, 300).await.unwrap();

        let err = fx.authenticator(users).authenticate(Some(&header)).await.unwrap_err();
        assert!(matches!(err, AuthError::RevokedCredential));
        fx.cache.shutdown().await;
    }

    #[tokio::test]
    async fn test_expired_token_is_rejected() {
        let fx = Fixture::new().await;
        let users = Arc::new(InMemoryUserLookup::new().with_user("u-1", Role::Admin));
        let now = Utc::now().timestamp();
        let token = fx
            .jwt
            .encode(&Claims {
                id: "u-1".to_string(),
                iat: now - 100,
                exp: now - 1,
            })
            .unwrap();

        let err = fx
            .authenticator(users)
            .authenticate(Some(&format!("Bearer {}", token)))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::ExpiredCredential));
        fx.cache.shutdown().await;
    }

    #[tokio::test]
    async fn test_garbage_token_is_invalid() {
        let fx = Fixture::new().await;
        let users = Arc::new(InMemoryUserLookup::new());

        let err = fx
            .authenticator(users)
            .authenticate(Some("Bearer not-a-jwt"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredential));
        fx.cache.shutdown().await;
    }

    #[tokio::test]
    async fn test_unknown_user_is_rejected() {
        let fx = Fixture::new().await;
        let mut users = MockUserLookup::new();
        users.expect_find_by_id().times(1).returning(|_| Ok(None));
        let (header, _) = fx.bearer("ghost");

        let err = fx
            .authenticator(Arc::new(users))
            .authenticate(Some(&header))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::PrincipalNotFound));
        fx.cache.shutdown().await;
    }

    #[tokio::test]
    async fn test_blacklist_failure_fails_closed() {
        let fx = Fixture::new().await;
        let mut users = MockUserLookup::new();
        users.expect_find_by_id().never();
        let (header, _) = fx.bearer("u-1");

        fx.store.fail_next_ops(1, "ERR connection reset");
        let err = fx
            .authenticator(Arc::new(users))
            .authenticate(Some(&header))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Infrastructure(ShopError::Cache { .. })));
        fx.cache.shutdown().await;
    }

    #[tokio::test]
    async fn test_lookup_failure_is_internal() {
        let fx = Fixture::new().await;
        let mut users = MockUserLookup::new();
        users
            .expect_find_by_id()
            .returning(|_| Err(ShopError::Internal("pool timed out".to_string())));
        let (header, _) = fx.bearer("u-1");

        let err = fx
            .authenticator(Arc::new(users))
            .authenticate(Some(&header))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Infrastructure(_)));
        fx.cache.shutdown().await;
    }

    #[tokio::test]
    async fn test_unknown_role_is_internal() {
        let fx = Fixture::new().await;
        let mut users = MockUserLookup::new();
        users.expect_find_by_id().returning(|id| {
            Ok(Some(PrincipalRecord {
                id: id.to_string(),
                role: "SUPERUSER".to_string(),
            }))
        });
        let (header, _) = fx.bearer("u-1");

        let err = fx
            .authenticator(Arc::new(users))
            .authenticate(Some(&header))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Internal(_)));
        fx.cache.shutdown().await;
    }
}
