use crate::entities::user::{self, Entity as UserEntity, Role};
use crate::error::AppError;
use crate::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

/// Resolves the bearer token into [`Claims`] and rejects callers of the wrong
/// role. The claims are handed to handlers as an extension.
pub async fn auth_middleware(
    State(auth): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or(AppError::Unauthenticated)?;

    let claims = validate_token(&auth.state, token, auth.role)
        .await
        .inspect_err(|err| debug!(error = %err, "rejected token"))?;
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i32,
    pub role: String,
    pub exp: usize,
}

#[derive(Clone)]
pub struct AuthState {
    pub state: AppState,
    pub role: Role,
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid or expired token")]
    InvalidToken,
    #[error("Unknown user or role")]
    UnknownUser,
    #[error("Role {0} may not use this endpoint")]
    WrongRole(Role),
    #[error("Failed to generate token")]
    GenerationFail,
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidToken | AuthError::UnknownUser => AppError::Unauthenticated,
            AuthError::WrongRole(_) => AppError::Unauthorized,
            AuthError::GenerationFail => AppError::Internal("token generation failed".into()),
            AuthError::Database(err) => AppError::from(err),
        }
    }
}

pub fn generate_token(state: &AppState, user_id: i32, role: Role) -> Result<String, AuthError> {
    let exp = Utc::now()
        .checked_add_signed(state.config.token_ttl)
        .ok_or(AuthError::GenerationFail)?
        .timestamp() as usize;

    let claims = Claims {
        user_id,
        role: role.to_string(),
        exp,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(state.config.secret.as_bytes()),
    )
    .map_err(|_| AuthError::GenerationFail)
}

pub async fn validate_token(
    state: &AppState,
    token: &str,
    required: Role,
) -> Result<Claims, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;

    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.config.secret.as_bytes()),
        &validation,
    )
    .map_err(|_| AuthError::InvalidToken)?
    .claims;

    let role = Role::from_str(&claims.role).map_err(|_| AuthError::InvalidToken)?;
    UserEntity::find_by_id(claims.user_id)
        .filter(user::Column::Role.eq(role))
        .one(&*state.db)
        .await?
        .ok_or(AuthError::UnknownUser)?;

    if role != required {
        return Err(AuthError::WrongRole(role));
    }
    Ok(claims)
}
