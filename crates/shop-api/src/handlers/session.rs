//! 会话相关的 HTTP 处理器
//!
//! 登出、查询当前主体、管理员吊销任意 Token

use axum::{Extension, Json, extract::State};
use tracing::info;
use validator::Validate;

use crate::auth::{AuthContext, Principal, VerifyOutcome, remaining_ttl_secs};
use crate::dto::{RevokeResponse, RevokeTokenRequest};
use crate::error::{AuthError, Result};
use crate::state::AppState;

/// 登出：把当前 Token 加入黑名单，直到其自然过期
///
/// POST /api/auth/logout
pub async fn logout(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
) -> Result<Json<RevokeResponse>> {
    let response = revoke(&state, &ctx.token, ctx.expires_at).await?;
    info!(user_id = %ctx.principal.id, "用户登出");
    Ok(Json(response))
}

/// 当前认证主体
///
/// GET /api/auth/me
pub async fn me(Extension(ctx): Extension<AuthContext>) -> Json<Principal> {
    Json(ctx.principal)
}

/// 管理员吊销任意 Token
///
/// POST /api/admin/tokens/revoke
pub async fn revoke_token(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(req): Json<RevokeTokenRequest>,
) -> Result<Json<RevokeResponse>> {
    req.validate()?;

    let claims = match state.jwt.verify(&req.token) {
        VerifyOutcome::Valid(claims) => claims,
        VerifyOutcome::Expired => return Ok(Json(RevokeResponse::skipped())),
        VerifyOutcome::InvalidSignature | VerifyOutcome::Malformed => {
            return Err(AuthError::Validation("Invalid token".to_string()));
        }
    };

    let response = revoke(&state, &req.token, claims.exp).await?;
    info!(
        operator = %ctx.principal.id,
        target_user = %claims.id,
        revoked = response.revoked,
        "管理员吊销 Token"
    );
    Ok(Json(response))
}

async fn revoke(state: &AppState, token: &str, exp: i64) -> Result<RevokeResponse> {
    let ttl = remaining_ttl_secs(exp);
    if state.blacklist.revoke(token, ttl).await? {
        Ok(RevokeResponse::revoked(ttl.unsigned_abs()))
    } else {
        Ok(RevokeResponse::skipped())
    }
}
