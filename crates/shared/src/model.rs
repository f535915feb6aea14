//! 领域模型
//!
//! 定义订单、客户、优惠与通知四个核心实体。所有实体序列化为 camelCase JSON，
//! 与 HTTP 接口和队列消息共用同一套 wire 格式：`order.created` / `order.canceled`
//! 队列中的消息体就是发布时刻的订单实体 JSON。

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::{DEPOT_COORDINATE, GeoPoint};

// ---------------------------------------------------------------------------
// Order — 订单实体
// ---------------------------------------------------------------------------

/// 订单状态
///
/// 状态由订单服务置为 pending，之后只有取消服务会修改（置为 cancelled）。
/// 订单实体只增不删。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    PickedUp,
    InTransit,
    Delivered,
    Cancelled,
}

/// 订单行项目
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub name: String,
    /// 数量，业务约束 >= 1，由订单服务在创建时校验
    pub quantity: u32,
    /// 单价，业务约束 >= 0
    pub price: f64,
}

impl OrderItem {
    /// 行小计
    pub fn subtotal(&self) -> f64 {
        self.price * self.quantity as f64
    }
}

/// 订单实体
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// 订单唯一标识（UUID v4），创建时生成，之后不可变
    pub order_id: String,
    pub customer_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub items: Vec<OrderItem>,
    /// 订单总额，创建时校验等于各行小计之和
    pub total_amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_notes: Option<String>,
    pub status: OrderStatus,
    pub timestamp: DateTime<Utc>,
    /// 当前位置，未指定时默认为仓库坐标
    pub current_location: GeoPoint,
}

/// 创建订单时的联系方式与备注，均为可选字段
#[derive(Debug, Clone, Default)]
pub struct OrderContact {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub delivery_notes: Option<String>,
}

impl Order {
    /// 构建新订单：生成 UUID v4 订单号，状态 pending，位置默认仓库坐标
    pub fn new(
        customer_name: impl Into<String>,
        items: Vec<OrderItem>,
        total_amount: f64,
        contact: OrderContact,
    ) -> Self {
        Self {
            order_id: Uuid::new_v4().to_string(),
            customer_name: customer_name.into(),
            email: contact.email,
            phone: contact.phone,
            address: contact.address,
            items,
            total_amount,
            delivery_notes: contact.delivery_notes,
            status: OrderStatus::Pending,
            timestamp: Utc::now(),
            current_location: DEPOT_COORDINATE,
        }
    }
}

// ---------------------------------------------------------------------------
// Customer — 静态客户目录条目
// ---------------------------------------------------------------------------

/// 候选客户
///
/// 来自只读客户目录的静态数据，进程生命周期内不可变。
/// `purchase_habit_score` 取值 0-10，衡量购买倾向。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub customer_id: String,
    pub name: String,
    pub location: GeoPoint,
    /// 下一次已排期的配送日期
    pub next_delivery_date: NaiveDate,
    pub purchase_habit_score: f64,
}

// ---------------------------------------------------------------------------
// Offer — 重新分配优惠
// ---------------------------------------------------------------------------

/// 优惠状态
///
/// 当前只建模初始的 pending，后续生命周期不在本系统范围内。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferStatus {
    Pending,
}

/// 折扣优惠
///
/// 每个成功处理且找到候选客户的取消事件恰好生成一条优惠记录。
/// `order_id` 同时充当幂等键：同一取消事件被重复投递时不会生成第二条优惠。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Offer {
    pub offer_id: String,
    pub order_id: String,
    pub customer_id: String,
    /// 折扣百分比，落在配置的区间内（默认 10-39）
    pub discount: u32,
    /// 承诺配送时长，形如 "2 days"
    pub delivery_time: String,
    pub status: OfferStatus,
    pub created_at: DateTime<Utc>,
}

impl Offer {
    /// 构建新优惠：生成 UUID v4 标识，状态 pending
    pub fn new(
        order_id: impl Into<String>,
        customer_id: impl Into<String>,
        discount: u32,
        delivery_days: u32,
    ) -> Self {
        Self {
            offer_id: Uuid::new_v4().to_string(),
            order_id: order_id.into(),
            customer_id: customer_id.into(),
            discount,
            delivery_time: format!("{delivery_days} days"),
            status: OfferStatus::Pending,
            created_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Notification — 客户通知
// ---------------------------------------------------------------------------

/// 客户通知
///
/// 紧随关联的优惠在同一处理步骤中创建。优惠的存在是权威事实，
/// 通知是尽力而为的副作用：持久化失败只记录日志，不回滚优惠。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// 存储分配的标识
    pub id: String,
    pub customer_id: String,
    pub message: String,
    pub offer_id: String,
    /// 已读标记，默认 false
    pub read: bool,
    pub created_at: DateTime<Utc>,
}
