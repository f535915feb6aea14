//! 共享库
//!
//! 包含各服务共用的配置、错误处理、领域模型、事件总线、存储和地理计算等基础设施代码。

pub mod bus;
pub mod config;
pub mod error;
pub mod geo;
pub mod model;
pub mod observability;
pub mod retry;
pub mod store;
