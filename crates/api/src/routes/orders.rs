//! Order routes: listing and operator decisions.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use domain::models::order::{ListOrdersQuery, RejectOrderRequest};
use domain::models::Order;
use persistence::repositories::OrderRepository;
use serde::Serialize;
use shared::pagination::clamp_limit;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::UserAuth;

#[derive(Debug, Serialize)]
pub struct OrdersResponse {
    pub orders: Vec<Order>,
}

/// GET /api/v1/orders?status=&limit=
pub async fn list_orders(
    State(state): State<AppState>,
    auth: UserAuth,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Json<OrdersResponse>, ApiError> {
    let orders = OrderRepository::new(state.pool.clone())
        .list_for_user(auth.user_id, query.status, clamp_limit(query.limit))
        .await?;
    Ok(Json(OrdersResponse { orders }))
}

/// GET /api/v1/orders/:id
pub async fn get_order(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, ApiError> {
    OrderRepository::new(state.pool.clone())
        .find_for_user(auth.user_id, id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Order not found".to_string()))
}

/// POST /api/v1/orders/:id/validate
///
/// 409 when the order is not pending or a product is short on stock.
pub async fn validate_order(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, ApiError> {
    Ok(Json(state.orders.validate(auth.user_id, id).await?))
}

/// POST /api/v1/orders/:id/reject
pub async fn reject_order(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(id): Path<Uuid>,
    body: Option<Json<RejectOrderRequest>>,
) -> Result<Json<Order>, ApiError> {
    let reason = match body {
        Some(Json(request)) => {
            request.validate()?;
            request
                .reason
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty())
        }
        None => None,
    };

    let order = state
        .orders
        .reject(auth.user_id, id, reason.as_deref())
        .await?;
    Ok(Json(order))
}

/// POST /api/v1/orders/:id/cancel
pub async fn cancel_order(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, ApiError> {
    Ok(Json(state.orders.cancel(auth.user_id, id).await?))
}

/// POST /api/v1/orders/:id/deliver
pub async fn deliver_order(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, ApiError> {
    Ok(Json(state.orders.mark_delivered(auth.user_id, id).await?))
}
