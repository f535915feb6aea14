//! 订单业务服务
//!
//! OrderService 负责校验并持久化新订单，随后发布 `order.created` 事件；
//! CancellationService 负责把订单置为 cancelled 并发布 `order.canceled` 事件。
//! 两者都遵循"先持久化、后发布"的顺序：事件发布失败不会回滚已落库的订单，
//! 这是有意保留的至少一次语义（改进方向是 outbox 模式，见 DESIGN.md）。

use tracing::{error, info, warn};

use relay_shared::bus::{EventBus, topics};
use relay_shared::error::RelayError;
use relay_shared::model::{Order, OrderContact, OrderItem, OrderStatus};
use relay_shared::retry::{RetryPolicy, retry_with_policy};
use relay_shared::store::OrderRepository;

use crate::error::OrderApiError;

/// 金额比较容差：行小计求和后的浮点误差不应导致合法订单被拒绝
const AMOUNT_TOLERANCE: f64 = 0.01;

// ---------------------------------------------------------------------------
// OrderService — 订单创建
// ---------------------------------------------------------------------------

/// 订单创建服务
///
/// 依赖注入订单仓储与事件总线句柄，每个请求同步执行，
/// 除仓储句柄外不持有任何进程内可变状态。
#[derive(Clone)]
pub struct OrderService {
    orders: OrderRepository,
    bus: EventBus,
    retry: RetryPolicy,
}

impl OrderService {
    pub fn new(orders: OrderRepository, bus: EventBus) -> Self {
        Self {
            orders,
            bus,
            retry: RetryPolicy::default(),
        }
    }

    /// 创建订单
    ///
    /// 校验通过后：生成订单号、状态 pending、位置默认仓库坐标，
    /// 持久化订单，再发布携带完整订单负载的 `order.created` 事件。
    pub async fn create_order(
        &self,
        customer_name: &str,
        items: Vec<OrderItem>,
        total_amount: f64,
        contact: OrderContact,
    ) -> Result<Order, OrderApiError> {
        validate_order_data(customer_name, &items, total_amount)?;

        let order = Order::new(customer_name.trim(), items, total_amount, contact);
        self.orders.insert(&order)?;

        info!(
            order_id = %order.order_id,
            customer_name = %order.customer_name,
            total_amount = order.total_amount,
            "订单已创建"
        );
        metrics::counter!("orders_created_total").increment(1);

        // 订单已落库，发布失败只记录日志，不向调用方返回错误
        publish_order_event(&self.bus, &self.retry, topics::ORDER_CREATED, &order).await;

        Ok(order)
    }
}

/// 订单数据校验
///
/// 客户名非空、行项目非空且每行数量 >= 1、单价 >= 0、
/// 总额为正且与行小计之和一致（容差 0.01）。
fn validate_order_data(
    customer_name: &str,
    items: &[OrderItem],
    total_amount: f64,
) -> Result<(), OrderApiError> {
    if customer_name.trim().is_empty() {
        return Err(OrderApiError::InvalidOrderData(
            "customerName 不能为空".to_string(),
        ));
    }

    if items.is_empty() {
        return Err(OrderApiError::InvalidOrderData(
            "items 不能为空".to_string(),
        ));
    }

    for item in items {
        if item.quantity < 1 {
            return Err(OrderApiError::InvalidOrderData(format!(
                "行项目 {} 的数量必须 >= 1",
                item.name
            )));
        }
        if !item.price.is_finite() || item.price < 0.0 {
            return Err(OrderApiError::InvalidOrderData(format!(
                "行项目 {} 的单价必须 >= 0",
                item.name
            )));
        }
    }

    if !total_amount.is_finite() || total_amount <= 0.0 {
        return Err(OrderApiError::InvalidOrderData(
            "totalAmount 必须为正数".to_string(),
        ));
    }

    let subtotal_sum: f64 = items.iter().map(OrderItem::subtotal).sum();
    if (subtotal_sum - total_amount).abs() > AMOUNT_TOLERANCE {
        return Err(OrderApiError::InvalidOrderData(format!(
            "totalAmount ({total_amount}) 与行小计之和 ({subtotal_sum}) 不一致"
        )));
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// CancellationService — 订单取消
// ---------------------------------------------------------------------------

/// 订单取消服务
///
/// 当前不设状态迁移约束：任何状态的订单（包括已送达）都可以取消，
/// 与参考行为保持一致；更严格的状态机见 DESIGN.md 的记录。
#[derive(Clone)]
pub struct CancellationService {
    orders: OrderRepository,
    bus: EventBus,
    retry: RetryPolicy,
}

impl CancellationService {
    pub fn new(orders: OrderRepository, bus: EventBus) -> Self {
        Self {
            orders,
            bus,
            retry: RetryPolicy::default(),
        }
    }

    /// 取消订单
    ///
    /// 订单状态更新为 cancelled 并持久化，之后发布携带更新后
    /// 完整订单负载的 `order.canceled` 事件，返回更新后的订单。
    pub async fn cancel_order(&self, order_id: &str) -> Result<Order, OrderApiError> {
        let order = self
            .orders
            .update_status(order_id, OrderStatus::Cancelled)
            .map_err(|e| match e {
                RelayError::NotFound { .. } => OrderApiError::OrderNotFound(order_id.to_string()),
                other => OrderApiError::Shared(other),
            })?;

        info!(order_id = %order.order_id, "订单已取消");
        metrics::counter!("orders_cancelled_total").increment(1);

        publish_order_event(&self.bus, &self.retry, topics::ORDER_CANCELED, &order).await;

        Ok(order)
    }
}

/// 发布订单事件，消息体为发布时刻的完整订单 JSON
///
/// 发布失败按退避策略重试；重试耗尽后只记录错误——订单的存在
/// 不依赖事件投递是否成功。
async fn publish_order_event(bus: &EventBus, retry: &RetryPolicy, topic: &str, order: &Order) {
    let result = retry_with_policy(retry, topic, RelayError::is_retryable, || {
        let publish = bus.publish_json(topic, Some(order.order_id.as_str()), order);
        async move { publish }
    })
    .await;

    match result {
        Ok(offset) => {
            info!(topic, order_id = %order.order_id, offset, "订单事件已发布");
        }
        Err(e) => {
            // 事件丢失：订单仍然存在，但下游不会感知本次变更
            error!(
                topic,
                order_id = %order.order_id,
                error = %e,
                "订单事件发布失败，订单已持久化但事件未投递"
            );
            warn!(topic, order_id = %order.order_id, "考虑引入 outbox 模式消除此不一致窗口");
        }
    }
}
