use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};

use super::dish::{CategoryFilter, StatusPayload};
use super::IdsQuery;
use crate::error::AppResult;
use crate::middleware::auth::Claims;
use crate::services::catalog::{CatalogQuery, SetmealInput};
use crate::AppState;

//ROUTERS
pub fn admin_setmeal_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/setmeal",
            get(list_setmeals)
                .post(create_setmeal)
                .delete(delete_setmeals),
        )
        .route("/setmeal/page", get(page_setmeals))
        .route("/setmeal/:id", get(get_setmeal).put(update_setmeal))
        .route("/setmeal/:id/status", put(set_status))
        .layer(Extension(state))
}

//ROUTES
async fn create_setmeal(
    Extension(state): Extension<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<SetmealInput>,
) -> AppResult<impl IntoResponse> {
    let setmeal = state.catalog.create_setmeal(claims.user_id, payload).await?;
    Ok((StatusCode::CREATED, Json(setmeal)))
}

async fn list_setmeals(
    Extension(state): Extension<AppState>,
    Query(query): Query<CategoryFilter>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(state.catalog.list_setmeals(query.category_id).await?))
}

async fn page_setmeals(
    Extension(state): Extension<AppState>,
    Query(query): Query<CatalogQuery>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(state.catalog.page_setmeals(query).await?))
}

async fn get_setmeal(
    Extension(state): Extension<AppState>,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(state.catalog.get_setmeal(id).await?))
}

async fn update_setmeal(
    Extension(state): Extension<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i32>,
    Json(payload): Json<SetmealInput>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(
        state
            .catalog
            .update_setmeal(claims.user_id, id, payload)
            .await?,
    ))
}

async fn set_status(
    Extension(state): Extension<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i32>,
    Json(payload): Json<StatusPayload>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(
        state
            .catalog
            .set_setmeal_status(claims.user_id, id, payload.status)
            .await?,
    ))
}

async fn delete_setmeals(
    Extension(state): Extension<AppState>,
    Query(query): Query<IdsQuery>,
) -> AppResult<impl IntoResponse> {
    state.catalog.delete_setmeals(&query.parse()?).await?;
    Ok(StatusCode::NO_CONTENT)
}
