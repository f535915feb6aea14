//! 服务状态
//!
//! 持有路由处理器需要的业务服务与仓储句柄。所有成员都是
//! 廉价克隆的 handle，状态整体按值注入 axum Router。

use relay_shared::bus::EventBus;
use relay_shared::store::OrderRepository;

use crate::service::{CancellationService, OrderService};

/// 订单服务状态
#[derive(Clone)]
pub struct AppState {
    pub order_service: OrderService,
    pub cancellation_service: CancellationService,
    pub orders: OrderRepository,
}

impl AppState {
    /// 依赖注入入口：仓储和总线由组合根创建并在此装配
    pub fn new(orders: OrderRepository, bus: EventBus) -> Self {
        Self {
            order_service: OrderService::new(orders.clone(), bus.clone()),
            cancellation_service: CancellationService::new(orders.clone(), bus),
            orders,
        }
    }
}
