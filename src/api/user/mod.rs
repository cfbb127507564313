pub mod cart;
pub mod order;

use axum::{middleware::from_fn_with_state, Router};

use crate::entities::user::Role;
use crate::middleware::auth::{auth_middleware, AuthState};
use crate::AppState;
use cart::cart_router;
use order::order_router;

pub fn user_api_router(state: AppState) -> Router {
    Router::new()
        .merge(cart_router(state.clone()))
        .merge(order_router(state.clone()))
        .layer(from_fn_with_state(
            AuthState {
                state,
                role: Role::User,
            },
            auth_middleware,
        ))
}
