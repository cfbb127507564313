use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use crate::error::AppResult;
use crate::middleware::auth::Claims;
use crate::services::cart::CartItemPayload;
use crate::AppState;

//ROUTERS
pub fn cart_router(state: AppState) -> Router {
    Router::new()
        .route("/cart", get(get_cart).delete(clear_cart))
        .route("/cart/add", post(add_item))
        .route("/cart/sub", post(remove_item))
        .layer(Extension(state))
}

//ROUTES
async fn get_cart(
    Extension(state): Extension<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(state.cart.list(claims.user_id).await?))
}

async fn add_item(
    Extension(state): Extension<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CartItemPayload>,
) -> AppResult<impl IntoResponse> {
    let line = state
        .cart
        .add_item(claims.user_id, payload.item()?, payload.dish_flavor.as_deref())
        .await?;
    Ok(Json(line))
}

/// Takes one unit off; answers `null` once the line is gone.
async fn remove_item(
    Extension(state): Extension<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CartItemPayload>,
) -> AppResult<impl IntoResponse> {
    let line = state
        .cart
        .remove_one_unit(claims.user_id, payload.item()?, payload.dish_flavor.as_deref())
        .await?;
    Ok(Json(line))
}

async fn clear_cart(
    Extension(state): Extension<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<impl IntoResponse> {
    state.cart.clear(claims.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
