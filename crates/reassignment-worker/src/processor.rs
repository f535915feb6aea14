//! 取消订单事件处理器
//!
//! 对单个已取消订单执行完整的重新分配流程：
//! 幂等检查 -> 近邻过滤 -> 资格筛选 -> 生成优惠 -> 写入通知。
//! 优惠写入失败视为处理失败（触发重投），通知写入失败仅记录
//! 日志，不回滚已生成的优惠。

use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use relay_shared::config::ReassignmentConfig;
use relay_shared::model::{Offer, Order};
use relay_shared::store::{NotificationRepository, OfferRepository};
use tracing::{error, info, warn};

use crate::directory::CustomerDirectory;
use crate::error::ReassignmentError;
use crate::pipeline;

/// 单个订单事件的处理结果
#[derive(Debug)]
pub enum ReassignmentOutcome {
    /// 已为客户生成优惠与通知
    Reassigned { offer: Offer, customer_name: String },
    /// 半径内无候选客户，事件正常终结
    NoCandidate,
    /// 该订单已存在优惠，重复投递被幂等拦截
    AlreadyProcessed { offer_id: String },
}

/// 重新分配处理器
///
/// 组合三个依赖完成事件处理：
/// - `directory`: 候选客户来源
/// - `offers`: 优惠存储，兼作幂等检查（订单号唯一）
/// - `notifications`: 通知存储
pub struct ReassignmentProcessor {
    directory: Arc<dyn CustomerDirectory>,
    offers: OfferRepository,
    notifications: NotificationRepository,
    policy: ReassignmentConfig,
}

impl ReassignmentProcessor {
    pub fn new(
        directory: Arc<dyn CustomerDirectory>,
        offers: OfferRepository,
        notifications: NotificationRepository,
        policy: ReassignmentConfig,
    ) -> Self {
        Self {
            directory,
            offers,
            notifications,
            policy,
        }
    }

    /// 处理一条已取消订单，返回处理结果
    ///
    /// 幂等以订单号为键：同一订单的重复投递直接返回已有优惠，
    /// 不再生成第二份。
    pub async fn process(&self, order: &Order) -> Result<ReassignmentOutcome, ReassignmentError> {
        if let Some(existing) = self.offers.find_by_order(&order.order_id)? {
            info!(
                order_id = %order.order_id,
                offer_id = %existing.offer_id,
                "订单已存在优惠，跳过重复处理"
            );
            return Ok(ReassignmentOutcome::AlreadyProcessed {
                offer_id: existing.offer_id,
            });
        }

        let customers = self.directory.list_customers();
        let nearby = pipeline::nearby_candidates(&self.policy, &customers);

        if nearby.is_empty() {
            info!(order_id = %order.order_id, "半径内无候选客户，订单不再分配");
            metrics::counter!("reassignment_no_candidate_total").increment(1);
            return Ok(ReassignmentOutcome::NoCandidate);
        }

        let now = Utc::now();
        // nearby 非空时 select_candidate 必有产出，兜底走无候选分支
        let Some(target) = pipeline::select_candidate(&self.policy, now, &nearby) else {
            metrics::counter!("reassignment_no_candidate_total").increment(1);
            return Ok(ReassignmentOutcome::NoCandidate);
        };

        let (discount, delivery_days) = {
            let mut rng = rand::thread_rng();
            (
                rng.gen_range(self.policy.discount_min..=self.policy.discount_max),
                rng.gen_range(self.policy.delivery_days_min..=self.policy.delivery_days_max),
            )
        };

        let offer = Offer::new(&order.order_id, &target.customer_id, discount, delivery_days);
        self.offers
            .insert(&offer)
            .map_err(|e| ReassignmentError::OfferPersist(e.to_string()))?;

        info!(
            order_id = %order.order_id,
            offer_id = %offer.offer_id,
            customer_id = %target.customer_id,
            customer_name = %target.name,
            discount = offer.discount,
            delivery_time = %offer.delivery_time,
            "已生成重新分配优惠"
        );
        metrics::counter!("reassignment_offers_total").increment(1);

        // 通知为尽力而为：优惠已落库，通知失败不触发重投
        let message = format!(
            "You have a new offer for order {} with {}% discount!",
            order.order_id, offer.discount
        );
        match self
            .notifications
            .create(&target.customer_id, message, &offer.offer_id)
        {
            Ok(notification) => {
                info!(
                    notification_id = %notification.id,
                    customer_id = %target.customer_id,
                    "已写入优惠通知"
                );
            }
            Err(e) => {
                error!(
                    error = %e,
                    offer_id = %offer.offer_id,
                    "通知保存失败，优惠保留"
                );
            }
        }

        if order.status != relay_shared::model::OrderStatus::Cancelled {
            warn!(
                order_id = %order.order_id,
                status = ?order.status,
                "事件中的订单状态不是已取消，按取消事件继续处理"
            );
        }

        Ok(ReassignmentOutcome::Reassigned {
            offer,
            customer_name: target.name,
        })
    }
}
