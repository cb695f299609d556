//! 中间件模块
//!
//! 提供认证、角色检查和安全响应头中间件

mod auth;
mod role;
mod security;

pub use auth::{auth_middleware, extract_auth_context};
pub use role::require_roles;
pub use security::security_headers;
