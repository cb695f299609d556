//! 电商后端认证服务
//!
//! 提供 Bearer Token 认证、Token 吊销（黑名单）和基于角色的访问控制。
//!
//! ## 模块结构
//!
//! - `auth`: JWT、黑名单、认证器、角色守卫
//! - `middleware`: axum 认证 / 角色 / 安全头中间件
//! - `repository`: 用户查询
//! - `handlers`: HTTP 请求处理器
//! - `routes`: 路由配置
//! - `state`: 应用状态

pub mod auth;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod repository;
pub mod routes;
pub mod state;

pub use auth::{AuthContext, Principal, Role, RoleGuard};
pub use error::{AuthError, Result};
pub use state::AppState;
