//! 路由定义与请求/响应 DTO
//!
//! HTTP 契约（JSON，camelCase）：
//! - `POST /orders`              -> 201 {message, orderId, order} / 400 {error}
//! - `POST /orders/{id}/cancel`  -> 200 {message, order} / 404 {error}
//! - `GET  /orders/{id}/track`   -> 200 订单完整字段 / 404 {error}
//! - `GET  /orders`              -> 200 订单列表（管理用）
//! - `GET  /health`              -> 200 {status, timestamp, orders}

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use validator::Validate;

use relay_shared::model::{Order, OrderContact, OrderItem};

use crate::error::OrderApiError;
use crate::state::AppState;

// ============================================================================
// 请求/响应 DTO
// ============================================================================

/// 创建订单请求
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, message = "customerName 不能为空"))]
    pub customer_name: String,
    #[validate(length(min = 1, message = "items 不能为空"))]
    pub items: Vec<OrderItemRequest>,
    pub total_amount: f64,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub delivery_notes: Option<String>,
}

/// 订单行项目请求
///
/// 派生校验失败时 validator 会把字段值序列化进错误参数，
/// 因此 DTO 需要同时实现 Serialize。
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemRequest {
    pub name: String,
    pub quantity: u32,
    pub price: f64,
}

/// 创建订单响应
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderResponse {
    pub message: String,
    pub order_id: String,
    pub order: Order,
}

/// 取消订单响应
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelOrderResponse {
    pub message: String,
    pub order: Order,
}

/// 健康检查响应
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub orders: usize,
}

// ============================================================================
// 路由定义
// ============================================================================

/// 构建订单服务路由
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", post(create_order).get(list_orders))
        .route("/orders/{id}/cancel", post(cancel_order))
        .route("/orders/{id}/track", get(track_order))
        .route("/health", get(health))
}

// ============================================================================
// 路由处理器
// ============================================================================

/// 创建订单
///
/// POST /orders
async fn create_order(
    State(state): State<AppState>,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateOrderResponse>), OrderApiError> {
    // 请求体无法解析（字段缺失或类型不符）同样属于无效订单数据，
    // 统一返回 400 {error}，而不是 axum 默认的 422 纯文本响应
    let Json(req) = payload.map_err(|e| OrderApiError::InvalidOrderData(e.body_text()))?;

    req.validate()
        .map_err(|e| OrderApiError::InvalidOrderData(e.to_string()))?;

    let items: Vec<OrderItem> = req
        .items
        .into_iter()
        .map(|item| OrderItem {
            name: item.name,
            quantity: item.quantity,
            price: item.price,
        })
        .collect();

    let contact = OrderContact {
        email: req.email,
        phone: req.phone,
        address: req.address,
        delivery_notes: req.delivery_notes,
    };

    let order = state
        .order_service
        .create_order(&req.customer_name, items, req.total_amount, contact)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateOrderResponse {
            message: "Order created".to_string(),
            order_id: order.order_id.clone(),
            order,
        }),
    ))
}

/// 取消订单
///
/// POST /orders/{id}/cancel
async fn cancel_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CancelOrderResponse>, OrderApiError> {
    let order = state.cancellation_service.cancel_order(&id).await?;

    Ok(Json(CancelOrderResponse {
        message: "Order cancelled and published to order.canceled queue".to_string(),
        order,
    }))
}

/// 跟踪订单
///
/// GET /orders/{id}/track，返回存储中的订单完整字段
/// （orderId、status、currentLocation、timestamp 等）。
async fn track_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Order>, OrderApiError> {
    info!(order_id = %id, "跟踪订单");

    state
        .orders
        .find(&id)?
        .map(Json)
        .ok_or_else(|| {
            warn!(order_id = %id, "订单不存在");
            OrderApiError::OrderNotFound(id)
        })
}

/// 列出所有订单（管理用）
///
/// GET /orders
async fn list_orders(State(state): State<AppState>) -> Result<Json<Vec<Order>>, OrderApiError> {
    Ok(Json(state.orders.list()?))
}

/// 健康检查
///
/// GET /health
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK".to_string(),
        timestamp: Utc::now(),
        orders: state.orders.count(),
    })
}

// ============================================================================
// 单元测试
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use relay_shared::bus::{EventBus, topics};
    use relay_shared::config::BusConfig;
    use relay_shared::model::OrderStatus;
    use relay_shared::store::OrderRepository;
    use tower::ServiceExt;

    /// 创建测试用的应用实例
    fn create_test_app() -> (Router, AppState, EventBus) {
        let orders = OrderRepository::new();
        let bus = EventBus::new(BusConfig::default());
        let state = AppState::new(orders, bus.clone());
        let app = order_routes().with_state(state.clone());
        (app, state, bus)
    }

    fn valid_order_body() -> serde_json::Value {
        serde_json::json!({
            "customerName": "John Doe",
            "items": [{"name": "X", "quantity": 1, "price": 5.0}],
            "totalAmount": 5.0
        })
    }

    async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> axum::response::Response {
        app.oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("Content-Type", "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap()
    }

    async fn read_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_create_order_returns_201() {
        let (app, _state, bus) = create_test_app();

        let response = post_json(app, "/orders", valid_order_body()).await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let resp: CreateOrderResponse = read_json(response).await;
        assert_eq!(resp.message, "Order created");
        assert_eq!(resp.order_id, resp.order.order_id);
        assert_eq!(resp.order.status, OrderStatus::Pending);
        assert_eq!(bus.depth(topics::ORDER_CREATED), 1);
    }

    #[tokio::test]
    async fn test_create_order_empty_items_returns_400() {
        let (app, _state, _bus) = create_test_app();

        let body = serde_json::json!({
            "customerName": "John Doe",
            "items": [],
            "totalAmount": 5.0
        });

        let response = post_json(app, "/orders", body).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let err: serde_json::Value = read_json(response).await;
        assert!(err["error"].is_string());
    }

    /// items 长度校验的派生展开要求 DTO 可序列化，直接驱动 validate()
    /// 覆盖该路径
    #[test]
    fn test_create_order_request_validates_items_length() {
        let empty: CreateOrderRequest = serde_json::from_value(serde_json::json!({
            "customerName": "John Doe",
            "items": [],
            "totalAmount": 5.0
        }))
        .unwrap();
        assert!(empty.validate().is_err());

        let valid: CreateOrderRequest = serde_json::from_value(valid_order_body()).unwrap();
        assert!(valid.validate().is_ok());
    }

    /// 请求体缺失字段由 Json 提取器拒绝，仍应返回 400 和 {error} 结构
    #[tokio::test]
    async fn test_create_order_missing_total_amount_returns_400_json() {
        let (app, _state, bus) = create_test_app();

        let body = serde_json::json!({
            "customerName": "John Doe",
            "items": [{"name": "X", "quantity": 1, "price": 5.0}]
        });

        let response = post_json(app, "/orders", body).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let err: serde_json::Value = read_json(response).await;
        assert!(err["error"].is_string());
        assert_eq!(bus.depth(topics::ORDER_CREATED), 0);
    }

    #[tokio::test]
    async fn test_create_order_missing_customer_returns_400() {
        let (app, _state, _bus) = create_test_app();

        let body = serde_json::json!({
            "customerName": "",
            "items": [{"name": "X", "quantity": 1, "price": 5.0}],
            "totalAmount": 5.0
        });

        let response = post_json(app, "/orders", body).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_cancel_order_not_found_returns_404() {
        let (app, _state, _bus) = create_test_app();

        let response = post_json(app, "/orders/no-such-id/cancel", serde_json::json!({})).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let err: serde_json::Value = read_json(response).await;
        assert!(err["error"].is_string());
    }

    #[tokio::test]
    async fn test_cancel_order_returns_cancelled_order() {
        let (app, state, bus) = create_test_app();

        let response = post_json(app, "/orders", valid_order_body()).await;
        let created: CreateOrderResponse = read_json(response).await;

        let app = order_routes().with_state(state);
        let response = post_json(
            app,
            &format!("/orders/{}/cancel", created.order_id),
            serde_json::json!({}),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let resp: CancelOrderResponse = read_json(response).await;
        assert_eq!(resp.order.status, OrderStatus::Cancelled);
        assert_eq!(bus.depth(topics::ORDER_CANCELED), 1);
    }

    #[tokio::test]
    async fn test_track_order() {
        let (app, state, _bus) = create_test_app();

        let response = post_json(app, "/orders", valid_order_body()).await;
        let created: CreateOrderResponse = read_json(response).await;

        let app = order_routes().with_state(state);
        let response = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri(format!("/orders/{}/track", created.order_id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let tracked: Order = read_json(response).await;
        assert_eq!(tracked.order_id, created.order_id);
        assert_eq!(tracked.status, OrderStatus::Pending);
        // 默认位置为仓库坐标
        assert_eq!(tracked.current_location.lat, 28.6139);
    }

    #[tokio::test]
    async fn test_track_unknown_order_returns_404() {
        let (app, _state, _bus) = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/orders/unknown/track")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_health_reports_order_count() {
        let (app, state, _bus) = create_test_app();

        post_json(app, "/orders", valid_order_body()).await;

        let app = order_routes().with_state(state);
        let response = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let resp: HealthResponse = read_json(response).await;
        assert_eq!(resp.status, "OK");
        assert_eq!(resp.orders, 1);
    }
}
