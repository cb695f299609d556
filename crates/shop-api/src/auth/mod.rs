//! 认证模块
//!
//! 提供 JWT 处理、Token 黑名单、请求认证和基于角色的访问控制

mod authenticator;
mod blacklist;
mod guard;
mod jwt;
mod principal;

pub use authenticator::{TokenAuthenticator, parse_authorization};
pub use blacklist::{REVOKED_MARKER, TokenBlacklist};
pub use guard::{RoleGuard, authorize};
pub use jwt::{Claims, JwtManager, VerifyOutcome, remaining_ttl_secs};
pub use principal::{AuthContext, Principal, PrincipalRecord, Role, UnknownRole};
