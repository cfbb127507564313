use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::entities::order::PayMethod;
use crate::error::AppResult;
use crate::middleware::auth::Claims;
use crate::services::order::{Actor, OrderAction, OrderQuery, SubmitOrder};
use crate::AppState;

//ROUTERS
pub fn order_router(state: AppState) -> Router {
    Router::new()
        .route("/order/submit", post(submit_order))
        .route("/order/payment", put(pay_order))
        .route("/order/history", get(order_history))
        .route("/order/:id", get(get_order))
        .route("/order/:id/cancel", put(cancel_order))
        .route("/order/:id/repetition", post(repeat_order))
        .layer(Extension(state))
}

//ROUTES
async fn submit_order(
    Extension(state): Extension<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<SubmitOrder>,
) -> AppResult<impl IntoResponse> {
    let submission = state.orders.submit(claims.user_id, payload).await?;
    Ok((StatusCode::CREATED, Json(submission)))
}

/// Requests a voucher and, with the simulated provider, reports the payment
/// back straight away.
async fn pay_order(
    Extension(state): Extension<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<PayOrder>,
) -> AppResult<impl IntoResponse> {
    let voucher = state
        .orders
        .request_payment(claims.user_id, &payload.order_number)
        .await?;
    let order = state
        .orders
        .confirm_paid(&voucher.order_number, payload.pay_method)
        .await?;
    Ok(Json(json!({
        "voucher": voucher,
        "status": order.status
    })))
}

async fn order_history(
    Extension(state): Extension<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<OrderQuery>,
) -> AppResult<impl IntoResponse> {
    let page = state
        .orders
        .page(Actor::Customer(claims.user_id), query)
        .await?;
    Ok(Json(page))
}

async fn get_order(
    Extension(state): Extension<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(
        state.orders.get(Actor::Customer(claims.user_id), id).await?,
    ))
}

async fn cancel_order(
    Extension(state): Extension<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    let order = state
        .orders
        .transition(
            Actor::Customer(claims.user_id),
            id,
            OrderAction::Cancel { reason: None },
        )
        .await?;
    Ok(Json(order))
}

async fn repeat_order(
    Extension(state): Extension<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    let lines = state.orders.repetition(claims.user_id, id).await?;
    Ok(Json(json!({ "lines": lines })))
}

//structs
#[derive(Deserialize)]
struct PayOrder {
    order_number: String,
    pay_method: PayMethod,
}
