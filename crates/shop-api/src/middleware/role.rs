//! 角色检查中间件
//!
//! 检查认证主体的角色是否在守卫允许的集合中

use axum::{
    body::Body,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::future::Future;
use std::pin::Pin;

use super::extract_auth_context;
use crate::auth::RoleGuard;

/// 角色检查中间件工厂
///
/// 须位于 `auth_middleware` 之后
///
/// # 示例
/// ```ignore
/// .route("/admin/tokens/revoke", post(revoke_token).layer(axum::middleware::from_fn(require_roles(RoleGuard::ADMIN_ONLY))))
/// ```
pub fn require_roles(
    guard: RoleGuard,
) -> impl Fn(Request<Body>, Next) -> Pin<Box<dyn Future<Output = Response> + Send>> + Clone + Send
{
    move |request: Request<Body>, next: Next| {
        Box::pin(async move { check_roles(request, next, guard).await })
    }
}

async fn check_roles(request: Request<Body>, next: Next, guard: RoleGuard) -> Response {
    let principal = extract_auth_context(&request).map(|ctx| &ctx.principal);

    if let Err(e) = guard.check(principal) {
        tracing::debug!(
            guard = guard.name(),
            role = ?principal.map(|p| p.role),
            "角色不满足要求"
        );
        return e.into_response();
    }

    next.run(request).await
}
