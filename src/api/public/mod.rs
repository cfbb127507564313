pub mod auth;
pub mod catalog;

use axum::Router;

use crate::AppState;
use catalog::catalog_router;

pub use auth::auth_router;

pub fn public_api_router(state: AppState) -> Router {
    Router::new().merge(catalog_router(state))
}
