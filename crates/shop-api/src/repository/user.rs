//! 用户查询
//!
//! 只投影 `id` 和 `role` 两列，不读取密码等凭证字段。

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use shop_shared::{Result, ShopError};
use sqlx::PgPool;
use tracing::instrument;

use crate::auth::{PrincipalRecord, Role};

/// 用户查询接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserLookup: Send + Sync {
    /// 按 ID 查询最小主体记录
    async fn find_by_id(&self, id: &str) -> Result<Option<PrincipalRecord>>;
}

/// 基于 PostgreSQL `users` 表的实现
#[derive(Clone)]
pub struct PgUserLookup {
    pool: PgPool,
}

impl PgUserLookup {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserLookup for PgUserLookup {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: &str) -> Result<Option<PrincipalRecord>> {
        sqlx::query_as::<_, PrincipalRecord>(
            "SELECT id::text AS id, role::text AS role FROM users WHERE id::text = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(ShopError::from)
    }
}

/// 内存实现，用于本地调试和集成测试
#[derive(Default)]
pub struct InMemoryUserLookup {
    users: RwLock<HashMap<String, Role>>,
}

impl InMemoryUserLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(self, id: &str, role: Role) -> Self {
        self.insert(id, role);
        self
    }

    pub fn insert(&self, id: &str, role: Role) {
        self.users.write().insert(id.to_string(), role);
    }

    pub fn remove(&self, id: &str) {
        self.users.write().remove(id);
    }
}

#[async_trait]
impl UserLookup for InMemoryUserLookup {
    async fn find_by_id(&self, id: &str) -> Result<Option<PrincipalRecord>> {
        Ok(self.users.read().get(id).map(|role| PrincipalRecord {
            id: id.to_string(),
            role: role.as_str().to_string(),
        }))
    }
}
