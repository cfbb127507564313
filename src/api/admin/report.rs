use axum::{
    extract::{Extension, Query},
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use crate::error::AppResult;
use crate::services::report::DateRange;
use crate::AppState;

//ROUTERS
pub fn admin_report_router(state: AppState) -> Router {
    Router::new()
        .route("/report/turnover", get(turnover))
        .route("/report/users", get(user_growth))
        .route("/report/orders", get(order_stats))
        .route("/report/top10", get(top10))
        .layer(Extension(state))
}

//ROUTES
async fn turnover(
    Extension(state): Extension<AppState>,
    Query(range): Query<DateRange>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(state.reports.turnover_by_day(range).await?))
}

async fn user_growth(
    Extension(state): Extension<AppState>,
    Query(range): Query<DateRange>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(state.reports.user_growth(range).await?))
}

async fn order_stats(
    Extension(state): Extension<AppState>,
    Query(range): Query<DateRange>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(state.reports.order_stats(range).await?))
}

async fn top10(
    Extension(state): Extension<AppState>,
    Query(range): Query<DateRange>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(state.reports.top10_sales(range).await?))
}
