//! 可观测性模块
//!
//! 提供日志（tracing）与 Prometheus 指标的统一初始化。
//! 消费者没有外部调用方可以汇报结果，其全部可观测性都来自这里的日志与计数器。

use anyhow::Result;
use axum::{Router, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::ObservabilityConfig;

/// 初始化日志订阅器
///
/// 日志级别优先取 RUST_LOG 环境变量，其次取配置项。
/// `log_format = "json"` 输出结构化日志，其余输出人类可读格式。
/// 重复初始化（如多个测试同进程）时静默忽略。
pub fn init_tracing(config: &ObservabilityConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let result = if config.log_format == "json" {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .try_init()
    } else {
        fmt().with_env_filter(env_filter).with_target(true).try_init()
    };

    if result.is_err() {
        // 已有全局订阅器（测试场景），保持现状
        tracing::debug!("tracing 订阅器已存在，跳过初始化");
    }
}

/// Metrics 资源守卫，持有指标 HTTP 服务器的任务句柄
pub struct MetricsHandle {
    _server_handle: tokio::task::JoinHandle<()>,
}

/// 初始化 Prometheus 指标导出
///
/// 安装全局 recorder，注册业务计数器描述，并在独立端口启动
/// `/metrics` 端点供 Prometheus 抓取。配置未启用时返回 None。
pub async fn init_metrics(config: &ObservabilityConfig) -> Result<Option<MetricsHandle>> {
    if !config.metrics_enabled {
        return Ok(None);
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    describe_metrics();

    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    let server_handle = start_metrics_server(addr, handle).await?;

    Ok(Some(MetricsHandle {
        _server_handle: server_handle,
    }))
}

/// 注册业务指标描述，出现在 /metrics 端点的 HELP 注释中
fn describe_metrics() {
    metrics::describe_counter!("orders_created_total", "Total number of orders created");
    metrics::describe_counter!("orders_cancelled_total", "Total number of orders cancelled");
    metrics::describe_counter!(
        "reassignment_offers_total",
        "Total number of reassignment offers created"
    );
    metrics::describe_counter!(
        "reassignment_no_candidate_total",
        "Cancellation events with no eligible reassignment candidate"
    );
    metrics::describe_counter!(
        "reassignment_dead_letter_total",
        "Messages routed to the dead letter queue"
    );
}

/// 启动指标 HTTP 服务器
async fn start_metrics_server(
    addr: SocketAddr,
    handle: PrometheusHandle,
) -> Result<tokio::task::JoinHandle<()>> {
    let app = Router::new().route("/metrics", get(move || async move { handle.render() }));

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "指标端点已启动");

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "指标服务器退出");
        }
    });

    Ok(server_handle)
}
