use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::IdsQuery;
use crate::entities::dish::SaleStatus;
use crate::error::AppResult;
use crate::middleware::auth::Claims;
use crate::services::catalog::{CatalogQuery, DishInput};
use crate::AppState;

//ROUTERS
pub fn admin_dish_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/dish",
            get(list_dishes).post(create_dish).delete(delete_dishes),
        )
        .route("/dish/page", get(page_dishes))
        .route("/dish/:id", get(get_dish).put(update_dish))
        .route("/dish/:id/status", put(set_status))
        .layer(Extension(state))
}

//ROUTES
async fn create_dish(
    Extension(state): Extension<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<DishInput>,
) -> AppResult<impl IntoResponse> {
    let dish = state.catalog.create_dish(claims.user_id, payload).await?;
    Ok((StatusCode::CREATED, Json(dish)))
}

async fn list_dishes(
    Extension(state): Extension<AppState>,
    Query(query): Query<CategoryFilter>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(state.catalog.list_dishes(query.category_id).await?))
}

async fn page_dishes(
    Extension(state): Extension<AppState>,
    Query(query): Query<CatalogQuery>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(state.catalog.page_dishes(query).await?))
}

/// The dish with its flavor choices.
async fn get_dish(
    Extension(state): Extension<AppState>,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(state.catalog.get_dish(id).await?))
}

async fn update_dish(
    Extension(state): Extension<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i32>,
    Json(payload): Json<DishInput>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(
        state
            .catalog
            .update_dish(claims.user_id, id, payload)
            .await?,
    ))
}

/// Answers with the setmeals a stop cascaded to.
async fn set_status(
    Extension(state): Extension<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i32>,
    Json(payload): Json<StatusPayload>,
) -> AppResult<impl IntoResponse> {
    let stopped = state
        .catalog
        .set_dish_status(claims.user_id, id, payload.status)
        .await?;
    Ok(Json(json!({
        "id": id,
        "status": payload.status,
        "stopped_setmeals": stopped
    })))
}

async fn delete_dishes(
    Extension(state): Extension<AppState>,
    Query(query): Query<IdsQuery>,
) -> AppResult<impl IntoResponse> {
    state.catalog.delete_dishes(&query.parse()?).await?;
    Ok(StatusCode::NO_CONTENT)
}

//structs
#[derive(Deserialize)]
pub(super) struct CategoryFilter {
    pub(super) category_id: Option<i32>,
}

#[derive(Deserialize)]
pub(super) struct StatusPayload {
    pub(super) status: SaleStatus,
}
