//! 订单服务
//!
//! 提供订单的 HTTP 接口：创建、取消与跟踪。创建与取消在持久化订单后
//! 各自向事件总线发布 `order.created` / `order.canceled` 事件，
//! 取消事件由重新分配消费者异步处理。

pub mod error;
pub mod routes;
pub mod service;
pub mod state;
