use axum::{
    extract::{Extension, Query},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::entities::category::Kind;
use crate::error::AppResult;
use crate::AppState;

//ROUTERS
pub fn catalog_router(state: AppState) -> Router {
    Router::new()
        .route("/category", get(get_categories))
        .route("/dish", get(get_dishes))
        .route("/setmeal", get(get_setmeals))
        .layer(Extension(state))
}

//ROUTES
async fn get_categories(
    Extension(state): Extension<AppState>,
    Query(query): Query<CategoryQuery>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(state.catalog.list_categories(query.kind).await?))
}

/// Sellable dishes of one category.
async fn get_dishes(
    Extension(state): Extension<AppState>,
    Query(query): Query<ListingQuery>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(state.catalog.sellable_dishes(query.category_id).await?))
}

async fn get_setmeals(
    Extension(state): Extension<AppState>,
    Query(query): Query<ListingQuery>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(state.catalog.sellable_setmeals(query.category_id).await?))
}

//structs
#[derive(Deserialize)]
struct CategoryQuery {
    kind: Option<Kind>,
}

#[derive(Deserialize)]
struct ListingQuery {
    category_id: i32,
}
