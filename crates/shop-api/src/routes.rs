//! 路由配置模块
//!
//! 定义所有 REST API 端点的路由映射

use axum::{
    Router, middleware,
    routing::{get, post},
};
use shop_shared::observability::middleware as obs_middleware;

use crate::auth::RoleGuard;
use crate::handlers;
use crate::middleware::security_headers;
use crate::state::AppState;

/// 健康检查路由（公开）
fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health::liveness))
        .route("/health/cache", get(handlers::health::cache_health))
        .route("/ready", get(handlers::health::readiness))
}

/// 会话路由，任意已认证角色可访问
fn session_routes(state: &AppState) -> Router<AppState> {
    let routes = Router::new()
        .route("/auth/logout", post(handlers::session::logout))
        .route("/auth/me", get(handlers::session::me));
    RoleGuard::ANY_AUTHENTICATED.protect(routes, state.clone())
}

/// 管理员路由
fn admin_routes(state: &AppState) -> Router<AppState> {
    let routes = Router::new().route(
        "/admin/tokens/revoke",
        post(handlers::session::revoke_token),
    );
    RoleGuard::ADMIN_ONLY.protect(routes, state.clone())
}

/// 业务 API 路由
pub fn api_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .merge(session_routes(state))
        .merge(admin_routes(state))
}

/// 构建完整应用（不含 CORS，由启动流程按配置添加）
pub fn app(state: AppState) -> Router {
    Router::new()
        .nest("/api", api_routes(&state))
        .merge(health_routes())
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(obs_middleware::http_tracing))
        .layer(middleware::from_fn(obs_middleware::request_id))
        .with_state(state)
}
