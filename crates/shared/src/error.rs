//! 统一错误处理模块
//!
//! 定义系统中所有共享的错误类型，使用 thiserror 提供良好的错误信息。

use thiserror::Error;

/// 系统错误类型
#[derive(Debug, Error)]
pub enum RelayError {
    // ==================== 存储错误 ====================
    #[error("存储错误: {0}")]
    Store(String),

    #[error("记录未找到: {entity} id={id}")]
    NotFound { entity: String, id: String },

    // ==================== 队列错误 ====================
    #[error("队列错误: {0}")]
    Queue(String),

    #[error("消息解析失败: {0}")]
    Serialization(String),

    // ==================== 验证错误 ====================
    #[error("参数验证失败: {0}")]
    Validation(String),

    #[error("无效的参数: {field} - {message}")]
    InvalidArgument { field: String, message: String },

    // ==================== 通用错误 ====================
    #[error("内部错误: {0}")]
    Internal(String),
}

/// 错误结果类型别名
pub type Result<T> = std::result::Result<T, RelayError>;

impl RelayError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::Store(_) => "STORE_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Queue(_) => "QUEUE_ERROR",
            Self::Serialization(_) => "MESSAGE_PARSE_FAILURE",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::InvalidArgument { .. } => "INVALID_ARGUMENT",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 是否为可重试错误
    ///
    /// 存储和队列属于瞬时基础设施故障，应配合退避策略重试；
    /// 验证失败和记录不存在属于业务结论，重试没有意义。
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(_) | Self::Queue(_))
    }
}
