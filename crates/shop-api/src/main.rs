//! 电商后端认证服务
//!
//! 启动顺序：配置 → 可观测性 → 缓存连接 → 数据库 → HTTP 服务。
//! 关闭顺序：收到信号即停止健康检查 → 排空请求 → 关闭缓存连接 → 关闭数据库连接池。

use std::sync::Arc;

use axum::http::HeaderValue;
use shop_api::{repository::PgUserLookup, routes, state::AppState};
use shop_shared::{CacheConnection, Database, config::AppConfig, observability};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

const SERVICE_NAME: &str = "shop-api";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env 不存在时忽略
    let _ = dotenvy::dotenv();

    let config = AppConfig::load(SERVICE_NAME)?;
    config.validate()?;

    let _guard = observability::init(&config.observability, &config.service_name).await?;
    info!(
        environment = %config.environment,
        "Starting {} on {}",
        config.service_name,
        config.server_addr()
    );

    // 缓存连接显式创建并注入，初始化失败时拒绝启动
    let cache = CacheConnection::redis(&config.redis)?;
    cache.initialize().await?;

    let db = Database::connect_lazy(&config.database)?;
    let users = Arc::new(PgUserLookup::new(db.pool().clone()));

    let state = AppState::new(cache.clone(), &config.auth, users)?.with_database(db.clone());
    let app = routes::app(state).layer(cors_layer(&config.server.cors_origins, config.is_production()));

    let listener = TcpListener::bind(config.server_addr()).await?;
    info!("Listening on {}", config.server_addr());

    // 收到信号即停止健康检查，排空请求期间连接仍可用
    let signal_cache = cache.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            signal_cache.stop_health_check();
        })
        .await?;

    // 请求排空后关闭缓存连接，再关闭数据库连接池
    cache.shutdown().await;
    db.close().await;

    info!("Server shutdown complete");
    Ok(())
}

/// CORS 配置：`*` 表示允许全部来源，否则按逗号分隔解析
fn cors_layer(allowed_origins: &str, production: bool) -> CorsLayer {
    if allowed_origins.trim() == "*" {
        if production {
            warn!("CORS allowed_origins=\"*\" 在生产环境中不安全，请设置为具体域名");
        }
        info!("CORS allowed_origins: * (all origins)");
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    info!("CORS allowed_origins: {}", allowed_origins);
    let origins: Vec<HeaderValue> = allowed_origins
        .split(',')
        .filter_map(|s| s.trim().parse::<HeaderValue>().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// 监听关闭信号
///
/// 容器编排通过 SIGTERM 通知停止；本地开发通过 Ctrl+C。
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("注册 Ctrl+C 处理器失败");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("注册 SIGTERM 处理器失败")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown..."),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown..."),
    }
}
