use axum::{
    extract::{Extension, Path, Query},
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};
use chrono::NaiveDateTime;
use serde::Deserialize;

use crate::error::AppResult;
use crate::middleware::auth::Claims;
use crate::services::order::{Actor, OrderAction, OrderQuery};
use crate::AppState;

//ROUTERS
pub fn admin_order_router(state: AppState) -> Router {
    Router::new()
        .route("/order/search", get(search_orders))
        .route("/order/statistics", get(order_statistics))
        .route("/order/:id", get(get_order))
        .route("/order/:id/confirm", put(confirm_order))
        .route("/order/:id/reject", put(reject_order))
        .route("/order/:id/cancel", put(cancel_order))
        .route("/order/:id/delivery", put(deliver_order))
        .route("/order/:id/complete", put(complete_order))
        .layer(Extension(state))
}

//ROUTES
async fn search_orders(
    Extension(state): Extension<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<OrderQuery>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(
        state.orders.page(Actor::Staff(claims.user_id), query).await?,
    ))
}

async fn order_statistics(Extension(state): Extension<AppState>) -> AppResult<impl IntoResponse> {
    Ok(Json(state.orders.statistics().await?))
}

async fn get_order(
    Extension(state): Extension<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(
        state.orders.get(Actor::Staff(claims.user_id), id).await?,
    ))
}

async fn confirm_order(
    Extension(state): Extension<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i32>,
    payload: Option<Json<ConfirmPayload>>,
) -> AppResult<impl IntoResponse> {
    let estimated_delivery_time = payload.and_then(|Json(p)| p.estimated_delivery_time);
    transition(
        &state,
        &claims,
        id,
        OrderAction::Confirm {
            estimated_delivery_time,
        },
    )
    .await
}

async fn reject_order(
    Extension(state): Extension<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i32>,
    Json(payload): Json<ReasonPayload>,
) -> AppResult<impl IntoResponse> {
    transition(
        &state,
        &claims,
        id,
        OrderAction::Reject {
            reason: payload.reason,
        },
    )
    .await
}

async fn cancel_order(
    Extension(state): Extension<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i32>,
    Json(payload): Json<ReasonPayload>,
) -> AppResult<impl IntoResponse> {
    transition(
        &state,
        &claims,
        id,
        OrderAction::Cancel {
            reason: Some(payload.reason),
        },
    )
    .await
}

async fn deliver_order(
    Extension(state): Extension<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    transition(&state, &claims, id, OrderAction::Deliver).await
}

async fn complete_order(
    Extension(state): Extension<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    transition(&state, &claims, id, OrderAction::Complete).await
}

async fn transition(
    state: &AppState,
    claims: &Claims,
    id: i32,
    action: OrderAction,
) -> AppResult<Json<crate::entities::order::Model>> {
    let order = state
        .orders
        .transition(Actor::Staff(claims.user_id), id, action)
        .await?;
    Ok(Json(order))
}

//structs
#[derive(Deserialize)]
struct ConfirmPayload {
    estimated_delivery_time: Option<NaiveDateTime>,
}

#[derive(Deserialize)]
struct ReasonPayload {
    reason: String,
}
