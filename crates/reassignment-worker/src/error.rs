//! 重新分配服务专用错误类型
//!
//! 在共享库 RelayError 基础上定义本服务特有的错误变体，
//! 用于区分"优惠保存失败"（致命，需要重投）与"通知保存失败"
//! （非致命，记录日志后继续）两条失败路径。

use relay_shared::error::RelayError;

/// 重新分配处理错误
#[derive(Debug, thiserror::Error)]
pub enum ReassignmentError {
    /// 优惠写入失败时订单事件未完成处理，返回错误触发重投
    #[error("优惠保存失败: {0}")]
    OfferPersist(String),

    /// 透传共享库错误，避免在每个 match 分支手动转换
    #[error(transparent)]
    Shared(#[from] RelayError),
}

impl ReassignmentError {
    /// 判断错误是否应当重投消息
    ///
    /// 反序列化失败属于毒消息，重投不会成功，但仍走重投路径
    /// 以便最终进入死信队列留存现场。
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::OfferPersist(_) => true,
            Self::Shared(e) => e.is_retryable(),
        }
    }
}
