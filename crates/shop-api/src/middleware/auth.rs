//! JWT 认证中间件
//!
//! 验证请求中的 Bearer Token 并将认证上下文注入请求扩展

use axum::{
    body::Body,
    extract::State,
    http::{Request, header::AUTHORIZATION},
    middleware::Next,
    response::{IntoResponse, Response},
};
use shop_shared::observability::metrics;

use crate::auth::AuthContext;
use crate::error::AuthError;
use crate::state::AppState;

/// 认证中间件
///
/// 成功时把 `AuthContext` 注入请求扩展；失败时直接返回 `{statusCode, message}`。
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let header = match request.headers().get(AUTHORIZATION) {
        None => None,
        Some(value) => match value.to_str() {
            Ok(value) => Some(value.to_string()),
            Err(_) => return reject(AuthError::MalformedCredential),
        },
    };

    match state.authenticator.authenticate(header.as_deref()).await {
        Ok(ctx) => {
            metrics::record_auth_attempt("ok");
            request.extensions_mut().insert(ctx);
            next.run(request).await
        }
        Err(e) => reject(e),
    }
}

fn reject(err: AuthError) -> Response {
    metrics::record_auth_attempt(err.outcome());
    tracing::debug!(outcome = err.outcome(), "认证失败");
    err.into_response()
}

/// 从请求扩展中提取认证上下文
pub fn extract_auth_context(request: &Request<Body>) -> Option<&AuthContext> {
    request.extensions().get::<AuthContext>()
}
