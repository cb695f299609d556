//! 认证流程集成测试
//!
//! 使用内存缓存和内存用户表驱动完整路由。

use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    body::Body,
    http::{Request, StatusCode, header},
    routing::get,
};
use chrono::Utc;
use serde_json::{Value, json};
use shop_api::{
    AppState, AuthContext, Principal, Role, RoleGuard,
    auth::Claims,
    repository::InMemoryUserLookup,
    routes,
};
use shop_shared::{
    CacheConnection,
    config::AuthConfig,
    test_utils::{MemoryStore, test_redis_config},
};
use tower::ServiceExt;

struct TestApp {
    store: Arc<MemoryStore>,
    cache: CacheConnection,
    state: AppState,
}

impl TestApp {
    async fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let cache = CacheConnection::new(store.clone(), &test_redis_config());
        cache.initialize().await.unwrap();

        let users = InMemoryUserLookup::new()
            .with_user("admin-1", Role::Admin)
            .with_user("seller-1", Role::Seller)
            .with_user("customer-1", Role::Customer)
            .with_user("user-1", Role::User);

        let state = AppState::new(cache.clone(), &AuthConfig::default(), Arc::new(users)).unwrap();
        Self {
            store,
            cache,
            state,
        }
    }

    fn router(&self) -> Router {
        routes::app(self.state.clone())
    }

    fn token_for(&self, user_id: &str) -> String {
        self.state.jwt.issue(user_id).unwrap().0
    }

    fn expired_token_for(&self, user_id: &str) -> String {
        self.token_expiring_in(user_id, -60)
    }

    fn token_expiring_in(&self, user_id: &str, secs: i64) -> String {
        let now = Utc::now().timestamp();
        self.state
            .jwt
            .encode(&Claims {
                id: user_id.to_string(),
                iat: now - 7200,
                exp: now + secs,
            })
            .unwrap()
    }

    async fn shutdown(self) {
        self.cache.shutdown().await;
    }
}

async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn get_with_auth(uri: &str, authorization: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(value) = authorization {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    builder.body(Body::empty()).unwrap()
}

fn post_json(uri: &str, token: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_me_returns_principal() {
    let app = TestApp::new().await;
    let token = app.token_for("seller-1");

    let (status, body) = send(
        app.router(),
        get_with_auth("/api/auth/me", Some(&format!("Bearer {}", token))),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"id": "seller-1", "role": "SELLER"}));
    app.shutdown().await;
}

#[tokio::test]
async fn test_missing_header() {
    let app = TestApp::new().await;

    let (status, body) = send(app.router(), get_with_auth("/api/auth/me", None)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        body,
        json!({"statusCode": 401, "message": "Authorization token missing"})
    );
    app.shutdown().await;
}

#[tokio::test]
async fn test_expired_token_returns_token_expired() {
    let app = TestApp::new().await;
    let token = app.expired_token_for("customer-1");

    let (status, body) = send(
        app.router(),
        get_with_auth("/api/auth/me", Some(&format!("Bearer {}", token))),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({"statusCode": 401, "message": "Token expired"}));
    app.shutdown().await;
}

#[tokio::test]
async fn test_token_in_its_expiry_second_cannot_be_used_or_logged_out() {
    let app = TestApp::new().await;
    let token = app.token_expiring_in("customer-1", 0);

    let (status, body) = send(app.router(), post_json("/api/auth/logout", &token, json!({}))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({"statusCode": 401, "message": "Token expired"}));

    let (status, body) = send(
        app.router(),
        get_with_auth("/api/auth/me", Some(&format!("Bearer {}", token))),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({"statusCode": 401, "message": "Token expired"}));
    app.shutdown().await;
}

#[tokio::test]
async fn test_basic_scheme_is_invalid_format() {
    let app = TestApp::new().await;

    let (status, body) = send(app.router(), get_with_auth("/api/auth/me", Some("Basic xyz"))).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        body,
        json!({"statusCode": 401, "message": "Invalid authorization format"})
    );
    app.shutdown().await;
}

#[tokio::test]
async fn test_tampered_token_is_invalid() {
    let app = TestApp::new().await;
    let token = format!("{}x", app.token_for("admin-1"));

    let (status, body) = send(
        app.router(),
        get_with_auth("/api/auth/me", Some(&format!("Bearer {}", token))),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid token");
    app.shutdown().await;
}

#[tokio::test]
async fn test_unknown_user_is_rejected() {
    let app = TestApp::new().await;
    let token = app.token_for("nobody");

    let (status, body) = send(
        app.router(),
        get_with_auth("/api/auth/me", Some(&format!("Bearer {}", token))),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "User not found");
    app.shutdown().await;
}

#[tokio::test]
async fn test_customer_on_admin_route_is_forbidden() {
    let app = TestApp::new().await;
    let token = app.token_for("customer-1");

    let (status, body) = send(
        app.router(),
        post_json("/api/admin/tokens/revoke", &token, json!({"token": "whatever"})),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        body,
        json!({"statusCode": 403, "message": "Insufficient permissions"})
    );
    app.shutdown().await;
}

#[tokio::test]
async fn test_logout_revokes_token() {
    let app = TestApp::new().await;
    let token = app.token_for("customer-1");
    let bearer = format!("Bearer {}", token);

    let (status, body) = send(app.router(), post_json("/api/auth/logout", &token, json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["revoked"], true);

    // 黑名单条目的 TTL 不超过 Token 剩余有效期
    let key = app.state.blacklist.key_for(&token);
    let ttl = app.store.ttl_secs(&key).unwrap();
    assert!(ttl > 0 && ttl <= 86_400);

    let (status, body) = send(app.router(), get_with_auth("/api/auth/me", Some(&bearer))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        body,
        json!({"statusCode": 401, "message": "Token has been revoked"})
    );
    app.shutdown().await;
}

#[tokio::test]
async fn test_admin_revokes_other_token() {
    let app = TestApp::new().await;
    let admin = app.token_for("admin-1");
    let victim = app.token_for("seller-1");

    let (status, body) = send(
        app.router(),
        post_json("/api/admin/tokens/revoke", &admin, json!({"token": victim})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["revoked"], true);

    let (status, _) = send(
        app.router(),
        get_with_auth("/api/auth/me", Some(&format!("Bearer {}", victim))),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    app.shutdown().await;
}

#[tokio::test]
async fn test_admin_revoke_of_expired_token_is_noop() {
    let app = TestApp::new().await;
    let admin = app.token_for("admin-1");
    let expired = app.expired_token_for("seller-1");

    let (status, body) = send(
        app.router(),
        post_json("/api/admin/tokens/revoke", &admin, json!({"token": expired})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"revoked": false, "ttlSecs": null}));
    assert!(app.store.is_empty());
    app.shutdown().await;
}

#[tokio::test]
async fn test_admin_revoke_rejects_undecodable_token() {
    let app = TestApp::new().await;
    let admin = app.token_for("admin-1");

    let (status, body) = send(
        app.router(),
        post_json("/api/admin/tokens/revoke", &admin, json!({"token": "garbage"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["statusCode"], 400);

    let (status, _) = send(
        app.router(),
        post_json("/api/admin/tokens/revoke", &admin, json!({"token": ""})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    app.shutdown().await;
}

#[tokio::test]
async fn test_cache_failure_during_blacklist_lookup_is_500() {
    let app = TestApp::new().await;
    let token = app.token_for("admin-1");

    app.store.fail_next_ops(1, "ERR connection reset by peer");
    let (status, body) = send(
        app.router(),
        get_with_auth("/api/auth/me", Some(&format!("Bearer {}", token))),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body,
        json!({"statusCode": 500, "message": "Internal Server Error"})
    );
    app.shutdown().await;
}

#[tokio::test]
async fn test_requests_after_cache_shutdown_fail_fast() {
    let app = TestApp::new().await;
    let token = app.token_for("admin-1");
    let router = app.router();
    app.cache.shutdown().await;

    let (status, body) = send(
        router,
        get_with_auth("/api/auth/me", Some(&format!("Bearer {}", token))),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "Internal Server Error");
}

/// 用每个具名守卫保护一个探测路由，覆盖全部角色
#[tokio::test]
async fn test_named_guards_over_all_roles() {
    let app = TestApp::new().await;
    let users = [
        ("admin-1", Role::Admin),
        ("seller-1", Role::Seller),
        ("customer-1", Role::Customer),
        ("user-1", Role::User),
    ];

    for guard in RoleGuard::ALL {
        let probe = Router::new().route(
            "/probe",
            get(|Extension(ctx): Extension<AuthContext>| async move { Json(ctx.principal) }),
        );
        let router = guard
            .protect(probe, app.state.clone())
            .with_state(app.state.clone());

        for (user_id, role) in users {
            let token = app.token_for(user_id);
            let (status, body) = send(
                router.clone(),
                get_with_auth("/probe", Some(&format!("Bearer {}", token))),
            )
            .await;

            if guard.allows(role) {
                assert_eq!(status, StatusCode::OK, "guard {} role {}", guard.name(), role);
                let principal: Principal = serde_json::from_value(body).unwrap();
                assert_eq!(principal.role, role);
            } else {
                assert_eq!(
                    status,
                    StatusCode::FORBIDDEN,
                    "guard {} role {}",
                    guard.name(),
                    role
                );
            }
        }
    }
    app.shutdown().await;
}

#[tokio::test]
async fn test_health_endpoints() {
    let app = TestApp::new().await;

    let (status, body) = send(app.router(), get_with_auth("/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = send(app.router(), get_with_auth("/health/cache", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"status": "healthy", "details": "Cache connection is healthy"})
    );

    let (status, body) = send(app.router(), get_with_auth("/ready", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["checks"]["database"], "skipped");

    app.store.fail_pings(true);
    let (status, body) = send(app.router(), get_with_auth("/health/cache", None)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unhealthy");

    app.store.fail_pings(false);
    app.shutdown().await;
}

#[tokio::test]
async fn test_security_and_request_id_headers() {
    let app = TestApp::new().await;

    let response = app
        .router()
        .oneshot(get_with_auth("/health", None))
        .await
        .unwrap();

    let headers = response.headers();
    assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
    assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
    assert!(headers.get("x-request-id").is_some());
    app.shutdown().await;
}
