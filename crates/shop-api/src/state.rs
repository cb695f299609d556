//! 应用状态定义
//!
//! 包含 Axum 路由共享的应用状态

use std::sync::Arc;

use shop_shared::config::AuthConfig;
use shop_shared::{CacheConnection, Database};

use crate::auth::{JwtManager, TokenAuthenticator, TokenBlacklist};
use crate::error::Result;
use crate::repository::UserLookup;

/// Axum 应用共享状态
///
/// 缓存连接由启动流程创建并注入，所有请求共享同一个句柄
#[derive(Clone)]
pub struct AppState {
    pub cache: CacheConnection,
    pub jwt: Arc<JwtManager>,
    pub blacklist: TokenBlacklist,
    pub authenticator: TokenAuthenticator,
    /// 就绪探针使用；未配置时跳过数据库检查
    pub database: Option<Database>,
}

impl AppState {
    pub fn new(
        cache: CacheConnection,
        auth_config: &AuthConfig,
        users: Arc<dyn UserLookup>,
    ) -> Result<Self> {
        let jwt = Arc::new(JwtManager::new(auth_config)?);
        let blacklist = TokenBlacklist::new(cache.clone(), auth_config.blacklist_key_prefix.clone());
        let authenticator = TokenAuthenticator::new(jwt.clone(), blacklist.clone(), users);

        Ok(Self {
            cache,
            jwt,
            blacklist,
            authenticator,
            database: None,
        })
    }

    pub fn with_database(mut self, database: Database) -> Self {
        self.database = Some(database);
        self
    }
}
