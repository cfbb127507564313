use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::entities::category::Kind;
use crate::error::AppResult;
use crate::services::catalog::NewCategory;
use crate::AppState;

//ROUTERS
pub fn admin_category_router(state: AppState) -> Router {
    Router::new()
        .route("/category", get(list_categories).post(create_category))
        .layer(Extension(state))
}

//ROUTES
async fn create_category(
    Extension(state): Extension<AppState>,
    Json(payload): Json<NewCategory>,
) -> AppResult<impl IntoResponse> {
    let category = state.catalog.create_category(payload).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

async fn list_categories(
    Extension(state): Extension<AppState>,
    Query(query): Query<KindQuery>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(state.catalog.list_categories(query.kind).await?))
}

//structs
#[derive(Deserialize)]
struct KindQuery {
    kind: Option<Kind>,
}
