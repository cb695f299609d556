//! Prometheus 指标模块
//!
//! 基于 metrics crate 和 metrics-exporter-prometheus 实现指标收集与导出。
//! 指标通过独立的 HTTP 端口暴露，供 Prometheus 抓取。
//! 记录函数在没有安装 recorder 时是空操作，测试中可以直接调用。

use anyhow::Result;
use axum::{Router, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::OnceLock;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::config::ObservabilityConfig;

/// 全局 Prometheus handle，用于渲染指标
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics 资源守卫
pub struct MetricsHandle {
    _server_handle: tokio::task::JoinHandle<()>,
}

/// 初始化 Prometheus 指标导出
///
/// 启动一个独立的 HTTP 服务器在指定端口暴露 `/metrics` 端点。
pub async fn init(config: &ObservabilityConfig, service_name: &str) -> Result<MetricsHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = PROMETHEUS_HANDLE.set(handle.clone());

    describe_metrics(service_name);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    let server_handle = start_metrics_server(addr, handle).await?;

    Ok(MetricsHandle {
        _server_handle: server_handle,
    })
}

/// 注册指标描述，出现在 /metrics 的 HELP 注释中
fn describe_metrics(service_name: &str) {
    metrics::describe_counter!("http_requests_total", "Total number of HTTP requests");
    metrics::describe_histogram!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds"
    );

    metrics::describe_counter!(
        "auth_attempts_total",
        "Authentication attempts by outcome"
    );

    metrics::describe_counter!("cache_operations_total", "Cache operations by status");
    metrics::describe_counter!(
        "cache_reconnects_total",
        "Automatic cache reconnects by trigger"
    );
    metrics::describe_counter!(
        "cache_health_checks_total",
        "Background cache health checks by result"
    );
    metrics::describe_gauge!("cache_connected", "1 when the cache connection is up");

    metrics::counter!("service_starts_total", "service" => service_name.to_string()).increment(1);
}

async fn start_metrics_server(
    addr: SocketAddr,
    handle: PrometheusHandle,
) -> Result<tokio::task::JoinHandle<()>> {
    let app = Router::new()
        .route("/metrics", get(move || std::future::ready(handle.render())))
        .route("/health", get(|| async { "OK" }));

    let listener = TcpListener::bind(addr).await?;
    info!("Metrics server listening on {}", addr);

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Metrics server error: {}", e);
        }
    });

    Ok(server_handle)
}

/// 获取全局 Prometheus handle
pub fn get_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

// ============================================================================
// 指标记录函数
// ============================================================================

/// 记录 HTTP 请求
#[inline]
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let status_str = status.to_string();
    metrics::counter!(
        "http_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status_str.clone()
    )
    .increment(1);

    metrics::histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status_str
    )
    .record(duration_secs);
}

/// 记录认证结果（ok / missing / malformed / invalid / expired / revoked / not_found / error）
#[inline]
pub fn record_auth_attempt(outcome: &'static str) {
    metrics::counter!("auth_attempts_total", "outcome" => outcome).increment(1);
}

/// 记录缓存操作
#[inline]
pub fn record_cache_operation(operation: &'static str, status: &'static str) {
    metrics::counter!(
        "cache_operations_total",
        "operation" => operation,
        "status" => status
    )
    .increment(1);
}

/// 记录一次自动重连
#[inline]
pub fn record_cache_reconnect(reason: &'static str) {
    metrics::counter!("cache_reconnects_total", "reason" => reason).increment(1);
}

/// 记录后台健康检查结果
#[inline]
pub fn record_cache_health_check(status: &'static str) {
    metrics::counter!("cache_health_checks_total", "status" => status).increment(1);
}

/// 更新缓存连接状态
#[inline]
pub fn set_cache_connected(connected: bool) {
    metrics::gauge!("cache_connected").set(if connected { 1.0 } else { 0.0 });
}
