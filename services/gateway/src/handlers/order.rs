use crate::auth::AuthenticatedUser;
use crate::error::AppError;
use crate::models::{CreateOrderRequest, ListQuery, OrderAccepted};
use crate::models::validate_order_request;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use persistence::OrderStore;
use types::ids::OrderId;
use types::order::Order;
use types::time::now_nanos;

/// Order intake: validate, persist, hand to the scheduler, acknowledge.
pub async fn create_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderAccepted>), AppError> {
    state
        .rate_limiter
        .check(&format!("{}:order_submit", user.account_id), 20, 10.0)?;

    let (symbol, quantity) = validate_order_request(&payload, &state.config)?;
    let order = Order::new(user.account_id, symbol, payload.side, quantity, now_nanos());

    state.store.create_order(&order).await?;
    state.scheduler.submit(&order)?;

    tracing::info!(
        order_id = %order.order_id,
        account_id = %user.account_id,
        symbol = %order.symbol,
        side = %order.side,
        "order accepted"
    );
    Ok((
        StatusCode::ACCEPTED,
        Json(OrderAccepted {
            order_id: order.order_id,
            status: order.status,
        }),
    ))
}

/// Fetch one of the caller's orders by identifier.
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(order_id): Path<String>,
) -> Result<Json<Order>, AppError> {
    let order_id: OrderId = order_id
        .parse()
        .map_err(|_| AppError::BadRequest("malformed order id".to_string()))?;

    let order = state.store.fetch_order(order_id).await?;
    // An order belonging to someone else reads as absent
    if order.account_id != user.account_id {
        return Err(AppError::NotFound(format!("order {}", order_id)));
    }
    Ok(Json(order))
}

/// The caller's recent orders, most recent first.
pub async fn list_orders(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Order>>, AppError> {
    let limit = query
        .limit
        .unwrap_or(state.config.default_list_limit)
        .min(state.config.max_list_limit);
    let orders = state.store.list_account_orders(user.account_id, limit).await?;
    Ok(Json(orders))
}
