//! 文档存储
//!
//! 底层是 DashMap 实现的按键文档存储，上层按实体包装为类型化仓储。
//! 仓储方法统一返回 `Result`，真实数据库后端替换进来时
//! 可以直接把连接故障映射为 `RelayError::Store` 而无需改动调用方。

use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{RelayError, Result};
use crate::model::{Notification, Offer, Order, OrderStatus};

// ---------------------------------------------------------------------------
// MemoryStore — 通用按键存储
// ---------------------------------------------------------------------------

/// 通用内存文档存储
///
/// 基于 DashMap，按字符串键读写，值整体替换（last-write-wins）。
/// Clone 共享同一份底层数据，handle 语义与连接池一致。
#[derive(Debug)]
pub struct MemoryStore<T> {
    data: Arc<DashMap<String, T>>,
}

impl<T: Clone> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> MemoryStore<T> {
    pub fn new() -> Self {
        Self {
            data: Arc::new(DashMap::new()),
        }
    }

    /// 插入或覆盖
    pub fn insert(&self, id: &str, value: T) {
        self.data.insert(id.to_string(), value);
    }

    /// 按键查找，返回值的克隆，不持有锁
    pub fn find(&self, id: &str) -> Option<T> {
        self.data.get(id).map(|v| v.clone())
    }

    /// 按条件筛选
    pub fn find_by<F>(&self, predicate: F) -> Vec<T>
    where
        F: Fn(&T) -> bool,
    {
        self.data
            .iter()
            .filter(|entry| predicate(entry.value()))
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// 所有记录
    pub fn list(&self) -> Vec<T> {
        self.data
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn count(&self) -> usize {
        self.data.len()
    }
}

impl<T> Clone for MemoryStore<T> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }
}

// ---------------------------------------------------------------------------
// OrderRepository — 订单仓储
// ---------------------------------------------------------------------------

/// 订单仓储，按 order_id 键入
#[derive(Debug, Clone, Default)]
pub struct OrderRepository {
    store: MemoryStore<Order>,
}

impl OrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, order: &Order) -> Result<()> {
        self.store.insert(&order.order_id, order.clone());
        Ok(())
    }

    pub fn find(&self, order_id: &str) -> Result<Option<Order>> {
        Ok(self.store.find(order_id))
    }

    /// 更新订单状态并返回更新后的实体
    ///
    /// 并发更新同一订单时 last-write-wins：订单只有状态会变化，
    /// 且取消在效果上幂等，这一语义是可接受的。
    pub fn update_status(&self, order_id: &str, status: OrderStatus) -> Result<Order> {
        let mut order = self
            .store
            .find(order_id)
            .ok_or_else(|| RelayError::NotFound {
                entity: "Order".to_string(),
                id: order_id.to_string(),
            })?;

        order.status = status;
        self.store.insert(order_id, order.clone());
        Ok(order)
    }

    pub fn list(&self) -> Result<Vec<Order>> {
        Ok(self.store.list())
    }

    pub fn count(&self) -> usize {
        self.store.count()
    }
}

// ---------------------------------------------------------------------------
// OfferRepository — 优惠仓储
// ---------------------------------------------------------------------------

/// 优惠仓储，按 offer_id 键入，order_id / customer_id 为外键引用
#[derive(Debug, Clone, Default)]
pub struct OfferRepository {
    store: MemoryStore<Offer>,
}

impl OfferRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, offer: &Offer) -> Result<()> {
        self.store.insert(&offer.offer_id, offer.clone());
        Ok(())
    }

    pub fn find(&self, offer_id: &str) -> Result<Option<Offer>> {
        Ok(self.store.find(offer_id))
    }

    /// 按订单号查找已有优惠
    ///
    /// order_id 是重新分配的幂等键：同一取消事件重复投递时，
    /// 这里命中即说明优惠已经生成过。
    pub fn find_by_order(&self, order_id: &str) -> Result<Option<Offer>> {
        Ok(self
            .store
            .find_by(|offer| offer.order_id == order_id)
            .into_iter()
            .next())
    }

    pub fn count(&self) -> usize {
        self.store.count()
    }
}

// ---------------------------------------------------------------------------
// NotificationRepository — 通知仓储
// ---------------------------------------------------------------------------

/// 通知仓储，标识由存储分配
#[derive(Debug, Clone, Default)]
pub struct NotificationRepository {
    store: MemoryStore<Notification>,
}

impl NotificationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建通知记录：存储分配标识，已读标记默认 false
    pub fn create(
        &self,
        customer_id: impl Into<String>,
        message: impl Into<String>,
        offer_id: impl Into<String>,
    ) -> Result<Notification> {
        let notification = Notification {
            id: Uuid::new_v4().to_string(),
            customer_id: customer_id.into(),
            message: message.into(),
            offer_id: offer_id.into(),
            read: false,
            created_at: chrono::Utc::now(),
        };

        self.store.insert(&notification.id, notification.clone());
        Ok(notification)
    }

    pub fn find(&self, id: &str) -> Result<Option<Notification>> {
        Ok(self.store.find(id))
    }

    /// 引用某条优惠的全部通知
    pub fn list_by_offer(&self, offer_id: &str) -> Result<Vec<Notification>> {
        Ok(self.store.find_by(|n| n.offer_id == offer_id))
    }

    pub fn count(&self) -> usize {
        self.store.count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{OrderContact, OrderItem};

    fn sample_order() -> Order {
        Order::new(
            "John Doe",
            vec![OrderItem {
                name: "Widget".to_string(),
                quantity: 1,
                price: 5.0,
            }],
            5.0,
            OrderContact::default(),
        )
    }

    #[test]
    fn test_order_repository_roundtrip() {
        let repo = OrderRepository::new();
        let order = sample_order();

        repo.insert(&order).unwrap();
        let found = repo.find(&order.order_id).unwrap().unwrap();
        assert_eq!(found.order_id, order.order_id);
        assert_eq!(found.status, OrderStatus::Pending);
    }

    #[test]
    fn test_order_repository_update_status() {
        let repo = OrderRepository::new();
        let order = sample_order();
        repo.insert(&order).unwrap();

        let updated = repo
            .update_status(&order.order_id, OrderStatus::Cancelled)
            .unwrap();
        assert_eq!(updated.status, OrderStatus::Cancelled);

        // 更新已持久化
        let found = repo.find(&order.order_id).unwrap().unwrap();
        assert_eq!(found.status, OrderStatus::Cancelled);
    }

    #[test]
    fn test_order_repository_update_status_not_found() {
        let repo = OrderRepository::new();
        let err = repo
            .update_status("no-such-order", OrderStatus::Cancelled)
            .unwrap_err();
        assert!(matches!(err, RelayError::NotFound { .. }));
    }

    #[test]
    fn test_offer_repository_find_by_order() {
        let repo = OfferRepository::new();
        let offer = Offer::new("ord-999", "cust002", 15, 1);
        repo.insert(&offer).unwrap();

        let found = repo.find_by_order("ord-999").unwrap().unwrap();
        assert_eq!(found.offer_id, offer.offer_id);
        assert!(repo.find_by_order("ord-other").unwrap().is_none());
    }

    #[test]
    fn test_notification_repository_assigns_id() {
        let repo = NotificationRepository::new();
        let n = repo
            .create("cust001", "You have a new offer", "offer-1")
            .unwrap();

        assert!(!n.id.is_empty());
        assert!(!n.read);
        assert_eq!(repo.list_by_offer("offer-1").unwrap().len(), 1);
        assert_eq!(repo.find(&n.id).unwrap().unwrap().customer_id, "cust001");
    }

    #[test]
    fn test_memory_store_handle_shares_data() {
        let store: MemoryStore<i32> = MemoryStore::new();
        let handle = store.clone();

        store.insert("k", 42);
        assert_eq!(handle.find("k"), Some(42));
        assert_eq!(handle.count(), 1);
    }
}
