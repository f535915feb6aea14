//! 队列消费者与事件分发
//!
//! 将 `order.canceled` 队列的消息解码为订单，交给
//! ReassignmentProcessor 执行重新分配。处理结果决定确认语义：
//! 返回 Ok 确认消息，返回 Err 触发重投，重投超限后由共享库
//! 消费循环转入死信队列。

use std::sync::Arc;

use relay_shared::bus::{EventBus, QueueConsumer, QueueMessage, topics};
use relay_shared::error::RelayError;
use relay_shared::model::Order;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::error::ReassignmentError;
use crate::processor::{ReassignmentOutcome, ReassignmentProcessor};

/// 取消订单事件消费者
///
/// 组合 QueueConsumer（消息拉取）与 ReassignmentProcessor（业务处理），
/// 形成完整的消费管道。
pub struct ReassignmentConsumer {
    consumer: QueueConsumer,
    processor: Arc<ReassignmentProcessor>,
}

impl ReassignmentConsumer {
    pub fn new(bus: &EventBus, processor: Arc<ReassignmentProcessor>) -> Self {
        Self {
            consumer: bus.consumer(topics::ORDER_CANCELED),
            processor,
        }
    }

    /// 启动消费循环，直到收到 shutdown 信号
    ///
    /// 单独抽取 handle_message 函数方便单元测试。
    pub async fn run(self, shutdown: watch::Receiver<bool>) {
        info!(topic = topics::ORDER_CANCELED, "重新分配消费者已启动");

        let processor = self.processor;
        self.consumer
            .start(shutdown, |msg| {
                let processor = Arc::clone(&processor);
                async move {
                    handle_message(&processor, &msg).await.map_err(|e| {
                        warn!(
                            error = %e,
                            topic = %msg.topic,
                            offset = msg.offset,
                            delivery_count = msg.delivery_count,
                            "处理取消事件失败，等待重投"
                        );
                        match e {
                            ReassignmentError::Shared(inner) => inner,
                            other => RelayError::Internal(other.to_string()),
                        }
                    })
                }
            })
            .await;

        info!("重新分配消费者已停止");
    }
}

/// 处理单条队列消息的完整流程
///
/// 拆分为独立函数而非方法，便于在测试中直接调用而无需构造完整的
/// Consumer。流程：反序列化 -> 重新分配处理 -> 按结果记录日志。
pub async fn handle_message(
    processor: &ReassignmentProcessor,
    msg: &QueueMessage,
) -> Result<(), ReassignmentError> {
    let order: Order = msg.deserialize_payload().map_err(|e| {
        warn!(error = %e, offset = msg.offset, "取消事件反序列化失败");
        ReassignmentError::Shared(e)
    })?;

    info!(
        order_id = %order.order_id,
        customer_name = %order.customer_name,
        delivery_count = msg.delivery_count,
        "收到取消订单事件"
    );

    match processor.process(&order).await? {
        ReassignmentOutcome::Reassigned {
            offer,
            customer_name,
        } => {
            info!(
                order_id = %order.order_id,
                offer_id = %offer.offer_id,
                customer_name = %customer_name,
                "订单重新分配完成"
            );
        }
        ReassignmentOutcome::NoCandidate => {
            info!(order_id = %order.order_id, "无可分配客户，事件终结");
        }
        ReassignmentOutcome::AlreadyProcessed { offer_id } => {
            info!(
                order_id = %order.order_id,
                offer_id = %offer_id,
                "重复投递已拦截"
            );
        }
    }

    Ok(())
}
