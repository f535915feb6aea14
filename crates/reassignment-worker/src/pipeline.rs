//! 近邻过滤与资格筛选管道
//!
//! 纯函数实现，所有阈值来自 ReassignmentConfig，当前时间由调用方
//! 注入，保证单元测试可确定性复现。管道分两级：
//! 1. 近邻过滤：与仓库坐标的大圆距离不超过半径
//! 2. 资格筛选：配送日期落在窗口内，或购买倾向分数达标
//!
//! 选择策略为"首个合格者优先，否则回退首个近邻"，遍历顺序
//! 即客户目录的返回顺序，保证同一输入产出同一结果。

use chrono::{DateTime, NaiveTime, Utc};
use relay_shared::config::ReassignmentConfig;
use relay_shared::geo::{GeoPoint, haversine_km};
use relay_shared::model::Customer;

/// 仓库坐标，取自策略配置
pub fn depot(policy: &ReassignmentConfig) -> GeoPoint {
    GeoPoint::new(policy.depot_lat, policy.depot_lng)
}

/// 近邻过滤：保留与仓库距离不超过半径的客户，保持输入顺序
pub fn nearby_candidates(policy: &ReassignmentConfig, customers: &[Customer]) -> Vec<Customer> {
    let origin = depot(policy);
    customers
        .iter()
        .filter(|c| haversine_km(origin, c.location) <= policy.proximity_radius_km)
        .cloned()
        .collect()
}

/// 距离下次配送日期的天数（可为负，带小数）
///
/// 配送日期按 UTC 零点计算。已过期的日期产出负值，依旧满足
/// 窗口条件，这类客户本就即将或已经进入配送周期，属于合理目标。
pub fn days_until_delivery(now: DateTime<Utc>, customer: &Customer) -> f64 {
    let delivery = customer
        .next_delivery_date
        .and_time(NaiveTime::MIN)
        .and_utc();
    (delivery - now).num_seconds() as f64 / 86_400.0
}

/// 资格判定：配送窗口与分数下限任一满足即合格
pub fn is_eligible(policy: &ReassignmentConfig, now: DateTime<Utc>, customer: &Customer) -> bool {
    days_until_delivery(now, customer) <= policy.delivery_window_days as f64
        || customer.purchase_habit_score >= policy.habit_score_floor
}

/// 在近邻集合中选出分配目标
///
/// 首个合格客户优先；无合格客户时回退到首个近邻，保证近邻
/// 集合非空时必有产出。
pub fn select_candidate(
    policy: &ReassignmentConfig,
    now: DateTime<Utc>,
    nearby: &[Customer],
) -> Option<Customer> {
    nearby
        .iter()
        .find(|c| is_eligible(policy, now, c))
        .or_else(|| nearby.first())
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn policy() -> ReassignmentConfig {
        ReassignmentConfig::default()
    }

    fn customer(id: &str, lat: f64, lng: f64, delivery: (i32, u32, u32), score: f64) -> Customer {
        Customer {
            customer_id: id.to_string(),
            name: id.to_string(),
            location: GeoPoint::new(lat, lng),
            next_delivery_date: NaiveDate::from_ymd_opt(delivery.0, delivery.1, delivery.2)
                .expect("valid date"),
            purchase_habit_score: score,
        }
    }

    fn fixed_now() -> DateTime<Utc> {
        NaiveDate::from_ymd_opt(2025, 7, 1)
            .expect("valid date")
            .and_time(NaiveTime::MIN)
            .and_utc()
    }

    /// 近邻过滤只保留半径内客户：仓库原点在内，Gurgaon（约 25 公里）在外
    #[test]
    fn test_nearby_filter_excludes_distant_customers() {
        let customers = vec![
            customer("at-depot", 28.6139, 77.2090, (2025, 7, 4), 5.0),
            customer("gurgaon", 28.4089, 77.3178, (2025, 7, 6), 9.1),
            customer("noida", 28.5355, 77.3910, (2025, 7, 2), 7.2),
        ];

        let nearby = nearby_candidates(&policy(), &customers);

        let ids: Vec<&str> = nearby.iter().map(|c| c.customer_id.as_str()).collect();
        assert_eq!(ids, vec!["at-depot"]);
    }

    /// 配送日期在 3 天窗口内即合格，与分数无关
    #[test]
    fn test_eligibility_by_delivery_window() {
        let p = policy();
        let now = fixed_now();

        let soon = customer("soon", 28.6139, 77.2090, (2025, 7, 3), 1.0);
        assert!(is_eligible(&p, now, &soon));

        let late = customer("late", 28.6139, 77.2090, (2025, 7, 10), 1.0);
        assert!(!is_eligible(&p, now, &late));
    }

    /// 分数达到下限即合格，配送日期可以在窗口之外
    #[test]
    fn test_eligibility_by_habit_score() {
        let p = policy();
        let now = fixed_now();

        let loyal = customer("loyal", 28.6139, 77.2090, (2025, 12, 1), 9.1);
        assert!(is_eligible(&p, now, &loyal));

        let casual = customer("casual", 28.6139, 77.2090, (2025, 12, 1), 6.8);
        assert!(!is_eligible(&p, now, &casual));
    }

    /// 已过期的配送日期天数为负，仍落在窗口内
    #[test]
    fn test_past_delivery_date_is_eligible() {
        let p = policy();
        let now = fixed_now();

        let overdue = customer("overdue", 28.6139, 77.2090, (2025, 6, 20), 1.0);
        assert!(days_until_delivery(now, &overdue) < 0.0);
        assert!(is_eligible(&p, now, &overdue));
    }

    /// 选择首个合格客户；同一输入重复执行产出同一结果
    #[test]
    fn test_select_first_eligible_is_deterministic() {
        let p = policy();
        let now = fixed_now();
        let nearby = vec![
            customer("casual", 28.6139, 77.2090, (2025, 12, 1), 6.8),
            customer("loyal-a", 28.6139, 77.2090, (2025, 12, 1), 9.1),
            customer("loyal-b", 28.6139, 77.2090, (2025, 12, 1), 9.5),
        ];

        for _ in 0..5 {
            let picked = select_candidate(&p, now, &nearby).expect("candidate");
            assert_eq!(picked.customer_id, "loyal-a");
        }
    }

    /// 无合格客户时回退到首个近邻
    #[test]
    fn test_select_falls_back_to_first_nearby() {
        let p = policy();
        let now = fixed_now();
        let nearby = vec![
            customer("first", 28.6139, 77.2090, (2025, 12, 1), 1.0),
            customer("second", 28.6139, 77.2090, (2025, 12, 1), 2.0),
        ];

        let picked = select_candidate(&p, now, &nearby).expect("candidate");
        assert_eq!(picked.customer_id, "first");
    }

    /// 近邻集合为空时无产出
    #[test]
    fn test_select_empty_nearby_returns_none() {
        assert!(select_candidate(&policy(), fixed_now(), &[]).is_none());
    }
}
