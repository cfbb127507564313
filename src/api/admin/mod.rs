pub mod category;
pub mod dish;
pub mod order;
pub mod report;
pub mod setmeal;

use axum::{middleware::from_fn_with_state, Router};
use serde::Deserialize;

use crate::entities::user::Role;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::{auth_middleware, AuthState};
use crate::AppState;

pub fn admin_api_router(state: AppState) -> Router {
    Router::new()
        .merge(category::admin_category_router(state.clone()))
        .merge(dish::admin_dish_router(state.clone()))
        .merge(setmeal::admin_setmeal_router(state.clone()))
        .merge(order::admin_order_router(state.clone()))
        .merge(report::admin_report_router(state.clone()))
        .layer(from_fn_with_state(
            AuthState {
                state,
                role: Role::Admin,
            },
            auth_middleware,
        ))
}

/// `?ids=1,2,3` for batch deletes.
#[derive(Deserialize)]
pub struct IdsQuery {
    ids: String,
}

impl IdsQuery {
    pub fn parse(&self) -> AppResult<Vec<i32>> {
        let ids = self
            .ids
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(|id| {
                id.parse::<i32>()
                    .map_err(|_| AppError::Validation(format!("invalid id: {id}")))
            })
            .collect::<AppResult<Vec<i32>>>()?;
        if ids.is_empty() {
            return Err(AppError::Validation("no ids given".into()));
        }
        Ok(ids)
    }
}
