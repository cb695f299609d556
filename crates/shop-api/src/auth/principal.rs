//! 认证主体
//!
//! 每个请求从已验证的 Token 加上一次用户查询得到，不做持久化。

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// 用户角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    Seller,
    Customer,
    /// 早期注册用户的遗留角色
    User,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Admin, Role::Seller, Role::Customer, Role::User];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::Seller => "SELLER",
            Self::Customer => "CUSTOMER",
            Self::User => "USER",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("未知角色: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    /// 大小写不敏感
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

/// 最小认证主体：只有 ID 和角色
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub role: Role,
}

/// 用户查询返回的原始记录
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct PrincipalRecord {
    pub id: String,
    pub role: String,
}

impl TryFrom<PrincipalRecord> for Principal {
    type Error = UnknownRole;

    fn try_from(record: PrincipalRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            role: record.role.parse()?,
            id: record.id,
        })
    }
}

/// 挂在请求扩展上的认证上下文
///
/// 保留原始 Token 是为了登出时写入黑名单；Debug 输出中 Token 被隐去。
#[derive(Clone)]
pub struct AuthContext {
    pub principal: Principal,
    pub token: String,
    /// Token 过期时间（Unix 秒）
    pub expires_at: i64,
}

impl fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthContext")
            .field("principal", &self.principal)
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
