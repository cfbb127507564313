use axum::{extract::Extension, http::StatusCode, response::IntoResponse, routing::post, Json, Router};
use chrono::Local;
use once_cell::sync::Lazy;
use regex::Regex;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use validator::Validate;

use crate::entities::{
    hash_password,
    user::{self, Entity as UserEntity, Role},
};
use crate::error::{AppError, AppResult};
use crate::middleware::auth::generate_token;
use crate::AppState;

static USERNAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_]{3,25}$").expect("username pattern is valid"));

//ROUTERS
pub fn auth_router(state: AppState) -> Router {
    Router::new()
        .route("/register", post(register_user))
        .route("/login", post(login))
        .layer(Extension(state))
}

//ROUTES
async fn register_user(
    Extension(state): Extension<AppState>,
    Json(payload): Json<CreateUser>,
) -> AppResult<impl IntoResponse> {
    payload.validate()?;
    let password = hash_password(&payload.password).map_err(AppError::Internal)?;

    let user = user::ActiveModel {
        username: Set(payload.username),
        password: Set(password),
        role: Set(Role::User),
        created_at: Set(Local::now().naive_local()),
        ..Default::default()
    }
    .insert(&*state.db)
    .await?;

    info!(user_id = user.id, username = %user.username, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "User registered successfully",
            "id": user.id
        })),
    ))
}

async fn login(
    Extension(state): Extension<AppState>,
    Json(payload): Json<UserLogin>,
) -> AppResult<impl IntoResponse> {
    let user = UserEntity::find()
        .filter(user::Column::Username.eq(&*payload.username))
        .one(&*state.db)
        .await?
        .ok_or(AppError::Unauthenticated)?;
    user.check_hash(&payload.password)
        .map_err(|_| AppError::Unauthenticated)?;

    let token = generate_token(&state, user.id, user.role)?;
    Ok(Json(json!({
        "token": token,
        "role": user.role
    })))
}

//structs
#[derive(Deserialize, Validate)]
struct CreateUser {
    #[validate(regex(path = *USERNAME_REGEX))]
    username: String,
    #[validate(length(min = 8, max = 64))]
    password: String,
}

#[derive(Deserialize)]
struct UserLogin {
    username: String,
    password: String,
}
