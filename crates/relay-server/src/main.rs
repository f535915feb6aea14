//! 订单服务进程入口
//!
//! 在单进程内组合两个组件：
//! - HTTP API（订单创建 / 取消 / 跟踪）
//! - 取消订单重新分配消费者
//!
//! 两者通过进程内事件总线衔接，消费者随 HTTP 服务一起优雅关闭。

use std::sync::Arc;

use anyhow::Result;
use order_api::routes::order_routes;
use order_api::state::AppState;
use reassignment_worker::consumer::ReassignmentConsumer;
use reassignment_worker::directory::StaticCustomerDirectory;
use reassignment_worker::processor::ReassignmentProcessor;
use relay_shared::bus::EventBus;
use relay_shared::config::AppConfig;
use relay_shared::observability;
use relay_shared::store::{NotificationRepository, OfferRepository, OrderRepository};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. 统一加载配置：config/default.toml + 环境文件 + RELAY_ 环境变量
    let config = AppConfig::load("relay-server").unwrap_or_else(|e| {
        eprintln!("配置加载失败，使用默认配置: {e}");
        AppConfig::default()
    });

    observability::init_tracing(&config.observability);
    let _metrics = observability::init_metrics(&config.observability).await?;

    info!(
        service = %config.service_name,
        environment = %config.environment,
        "Starting relay-server..."
    );

    // 2. 进程内事件总线与存储
    let bus = EventBus::new(config.bus.clone());
    let orders = OrderRepository::new();
    let offers = OfferRepository::new();
    let notifications = NotificationRepository::new();

    // 3. 启动重新分配消费者，watch 通道承载关闭信号
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let processor = Arc::new(ReassignmentProcessor::new(
        Arc::new(StaticCustomerDirectory::seed()),
        offers,
        notifications,
        config.reassignment.clone(),
    ));
    let consumer = ReassignmentConsumer::new(&bus, processor);
    let consumer_handle = tokio::spawn(consumer.run(shutdown_rx));
    info!("Reassignment consumer started");

    // 4. HTTP 路由：业务路由 + 跨域 + 请求追踪
    let state = AppState::new(orders, bus);
    let app = order_routes()
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = TcpListener::bind(config.server_addr()).await?;
    info!("Listening on {}", config.server_addr());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // 5. HTTP 停止后通知消费者退出并等待收尾
    if shutdown_tx.send(true).is_err() {
        warn!("消费者已提前退出");
    }
    if let Err(e) = consumer_handle.await {
        warn!(error = %e, "消费者任务未正常结束");
    }

    info!("Server shutdown complete");
    Ok(())
}

/// 监听关闭信号
///
/// K8s 通过 SIGTERM 通知 Pod 停止；本地开发通过 Ctrl+C。
/// 收到任一信号后返回，触发 axum 的优雅关闭流程。
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
