//! 取消订单重新分配服务
//!
//! 消费 `order.canceled` 队列中的订单事件，对仓库附近的客户执行
//! 近邻过滤与资格筛选，为选中客户生成折扣优惠并写入通知。
//! 处理失败的消息按至少一次语义重投，超过上限进入死信队列。

pub mod consumer;
pub mod directory;
pub mod error;
pub mod pipeline;
pub mod processor;
