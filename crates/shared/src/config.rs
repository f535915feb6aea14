//! 配置管理模块
//!
//! 支持多层配置文件加载，环境变量覆盖，以及类型安全的配置访问。

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// HTTP 服务配置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

/// 事件总线配置
#[derive(Debug, Clone, Deserialize)]
pub struct BusConfig {
    /// 同一条消息的最大投递次数，超过后进入死信队列
    pub max_deliveries: u32,
    /// 处理失败后距下一次重投的等待时间（毫秒）
    pub redelivery_delay_ms: u64,
    /// 单条消息的处理超时（毫秒），超时视为处理失败并重投
    pub processing_timeout_ms: u64,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            max_deliveries: 5,
            redelivery_delay_ms: 200,
            processing_timeout_ms: 30_000,
        }
    }
}

/// 重新分配策略配置
///
/// 资格管道的全部阈值都来自这里：仓库坐标、近邻半径、
/// 配送窗口、购买倾向分数下限，以及优惠的折扣/时长区间。
#[derive(Debug, Clone, Deserialize)]
pub struct ReassignmentConfig {
    pub depot_lat: f64,
    pub depot_lng: f64,
    /// 近邻过滤半径（公里）
    pub proximity_radius_km: f64,
    /// 配送日期资格窗口（天）
    pub delivery_window_days: i64,
    /// 购买倾向分数资格下限
    pub habit_score_floor: f64,
    /// 折扣百分比区间（闭区间）
    pub discount_min: u32,
    pub discount_max: u32,
    /// 承诺配送时长区间（天，闭区间）
    pub delivery_days_min: u32,
    pub delivery_days_max: u32,
}

impl Default for ReassignmentConfig {
    fn default() -> Self {
        Self {
            depot_lat: 28.6139,
            depot_lng: 77.2090,
            proximity_radius_km: 10.0,
            delivery_window_days: 3,
            habit_score_floor: 8.0,
            discount_min: 10,
            discount_max: 39,
            delivery_days_min: 1,
            delivery_days_max: 3,
        }
    }
}

/// 可观测性配置
#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
    /// 日志输出格式：json（结构化）或 pretty（人类可读）
    pub log_format: String,
    pub metrics_enabled: bool,
    pub metrics_port: u16,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_port: 9090,
        }
    }
}

/// 应用配置
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    pub service_name: String,
    pub environment: String,
    pub server: ServerConfig,
    pub bus: BusConfig,
    pub reassignment: ReassignmentConfig,
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    ///
    /// 加载顺序（后加载的会覆盖先加载的同名配置项）：
    /// 1. config/default.toml（默认配置）
    /// 2. config/{environment}.toml（环境特定配置）
    /// 3. 环境变量（RELAY_ 前缀，层级用双下划线分隔，
    ///    如 RELAY_SERVER__PORT -> server.port，
    ///    RELAY_BUS__MAX_DELIVERIES -> bus.max_deliveries；
    ///    单下划线无法区分层级分隔和 snake_case 键名本身的下划线）
    pub fn load(service_name: &str) -> Result<Self, ConfigError> {
        let env = std::env::var("RELAY_ENV").unwrap_or_else(|_| "development".to_string());
        let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".to_string());

        let builder = Config::builder()
            .set_default("service_name", service_name)?
            .set_default("environment", env.clone())?
            .add_source(File::from(Path::new(&config_dir).join("default.toml")).required(false))
            .add_source(
                File::from(Path::new(&config_dir).join(format!("{env}.toml"))).required(false),
            )
            .add_source(
                Environment::with_prefix("RELAY")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// 获取服务监听地址
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// 是否为生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}
