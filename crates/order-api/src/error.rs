//! 订单服务错误类型
//!
//! 请求路径上的错误直接映射为 HTTP 状态码和 `{error}` JSON 响应体。

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use relay_shared::error::RelayError;

/// 订单服务错误
#[derive(Debug, thiserror::Error)]
pub enum OrderApiError {
    /// 请求字段缺失或不合法，客户端错误，不重试
    #[error("无效的订单数据: {0}")]
    InvalidOrderData(String),

    /// 订单号未知
    #[error("订单不存在: {0}")]
    OrderNotFound(String),

    /// 透传共享库错误（存储、总线等基础设施故障）
    #[error(transparent)]
    Shared(#[from] RelayError),
}

impl OrderApiError {
    /// 返回对应的 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidOrderData(_) => StatusCode::BAD_REQUEST,
            Self::OrderNotFound(_) => StatusCode::NOT_FOUND,
            Self::Shared(RelayError::NotFound { .. }) => StatusCode::NOT_FOUND,
            Self::Shared(RelayError::Validation(_) | RelayError::InvalidArgument { .. }) => {
                StatusCode::BAD_REQUEST
            }
            Self::Shared(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for OrderApiError {
    /// 所有 4xx/5xx 响应统一为 `{error: string}` 结构
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}
