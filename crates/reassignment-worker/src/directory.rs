//! 客户目录
//!
//! 重新分配管道的候选客户来源。通过 trait 抽象数据来源，
//! 生产部署可替换为数据库或远程服务实现，演示环境使用
//! 内置的静态客户名单。

use chrono::NaiveDate;
use relay_shared::geo::GeoPoint;
use relay_shared::model::Customer;

/// 候选客户来源
///
/// 使用 trait object 而非泛型参数，因为目录会被存储到处理器中，
/// trait object 避免了泛型传播到整个调用链。
pub trait CustomerDirectory: Send + Sync {
    /// 返回全量候选客户，顺序稳定（后续选择逻辑依赖遍历顺序）
    fn list_customers(&self) -> Vec<Customer>;
}

/// 静态客户目录，内置德里地区的演示客户名单
pub struct StaticCustomerDirectory {
    customers: Vec<Customer>,
}

impl StaticCustomerDirectory {
    /// 构建内置名单：五位客户覆盖"仓库原点 / 10 公里外 / 高低分数 /
    /// 远近配送日期"的组合，便于验证过滤与资格规则
    pub fn seed() -> Self {
        let customers = vec![
            customer("cust001", "John Doe", 28.6139, 77.2090, 2025, 7, 4, 8.5),
            customer("cust002", "Priya Singh", 28.5355, 77.3910, 2025, 7, 2, 7.2),
            customer("cust003", "Rahul Sharma", 28.4089, 77.3178, 2025, 7, 6, 9.1),
            customer("cust004", "Ayesha Khan", 28.7041, 77.1025, 2025, 7, 1, 6.8),
            customer("cust005", "Vikram Patel", 28.4595, 77.0266, 2025, 7, 3, 8.9),
        ];
        Self { customers }
    }
}

impl CustomerDirectory for StaticCustomerDirectory {
    fn list_customers(&self) -> Vec<Customer> {
        self.customers.clone()
    }
}

fn customer(
    id: &str,
    name: &str,
    lat: f64,
    lng: f64,
    year: i32,
    month: u32,
    day: u32,
    score: f64,
) -> Customer {
    Customer {
        customer_id: id.to_string(),
        name: name.to_string(),
        location: GeoPoint::new(lat, lng),
        // 内置名单的日期均为合法日期，unwrap_or 兜底不会触发
        next_delivery_date: NaiveDate::from_ymd_opt(year, month, day)
            .unwrap_or(NaiveDate::MIN),
        purchase_habit_score: score,
    }
}
