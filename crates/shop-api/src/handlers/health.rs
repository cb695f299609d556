//! 健康检查处理器

use axum::{Json, extract::State, http::StatusCode};
use shop_shared::{HealthReport, HealthStatus};

use crate::dto::{ReadinessChecks, ReadinessResponse};
use crate::state::AppState;

pub const SERVICE_NAME: &str = "shop-api";

/// 存活探针：服务进程正常即返回 ok
///
/// GET /health
pub async fn liveness() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": SERVICE_NAME
    }))
}

/// 缓存连接健康状况
///
/// GET /health/cache
pub async fn cache_health(State(state): State<AppState>) -> (StatusCode, Json<HealthReport>) {
    let report = state.cache.health_check().await;
    let status = match report.status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, Json(report))
}

/// 就绪探针：检查缓存和数据库
///
/// GET /ready
pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<ReadinessResponse>) {
    let cache_ok = state.cache.ping().await.is_ok();
    let database = match &state.database {
        Some(db) => match db.health_check().await {
            Ok(()) => "ok",
            Err(_) => "fail",
        },
        None => "skipped",
    };
    let ready = cache_ok && database != "fail";

    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(ReadinessResponse {
            status: if ready { "ok" } else { "degraded" },
            service: SERVICE_NAME,
            checks: ReadinessChecks {
                cache: if cache_ok { "ok" } else { "fail" },
                database,
            },
        }),
    )
}
