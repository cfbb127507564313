use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::{DbErr, SqlErr};
use serde_json::json;
use thiserror::Error;

use crate::services::payment::PaymentError;

pub type AppResult<T> = Result<T, AppError>;

/// Every failure the engine reports. Consistency violations are raised before
/// anything is written; payment and identity failures are kept apart so a
/// client can tell "retry" from "fix the request".
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("Order cannot move from {from} by {action}")]
    InvalidStateTransition { from: String, action: &'static str },
    #[error("{0} is on sale and cannot be deleted")]
    ItemOnSale(String),
    #[error("Dish {0} is part of a setmeal and cannot be deleted")]
    ReferencedByCombo(i32),
    #[error("Setmeal {0} contains a stopped dish")]
    IncompleteComposition(i32),
    #[error("Order can no longer be cancelled by the customer")]
    CancelWindowClosed,
    #[error("{0} is not available for sale")]
    ItemNotSellable(String),
    #[error("Payment failed: {0}")]
    PaymentFailure(#[from] PaymentError),
    #[error("Authentication required")]
    Unauthenticated,
    #[error("Permission denied")]
    Unauthorized,
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Database error: {0}")]
    Database(DbErr),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::InvalidStateTransition { .. } => "INVALID_STATE_TRANSITION",
            Self::ItemOnSale(_) => "ITEM_ON_SALE",
            Self::ReferencedByCombo(_) => "REFERENCED_BY_COMBO",
            Self::IncompleteComposition(_) => "INCOMPLETE_COMPOSITION",
            Self::CancelWindowClosed => "CANCEL_WINDOW_CLOSED",
            Self::ItemNotSellable(_) => "ITEM_NOT_SELLABLE",
            Self::PaymentFailure(_) => "PAYMENT_FAILURE",
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Conflict(_) => "CONFLICT",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidStateTransition { .. } | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::ItemOnSale(_)
            | Self::ReferencedByCombo(_)
            | Self::IncompleteComposition(_)
            | Self::CancelWindowClosed
            | Self::ItemNotSellable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::PaymentFailure(_) => StatusCode::BAD_GATEWAY,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Unauthorized => StatusCode::FORBIDDEN,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }
}

impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(detail)) => Self::Conflict(detail),
            _ => Self::Database(err),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::Validation(err.to_string())
    }
}

/// What the logging middleware gets to see about a failed request.
#[derive(Clone, Debug)]
pub struct LoggedError {
    pub code: &'static str,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let message = self.to_string();

        // Internal details stay in the log, not in the body.
        let public_message = match &self {
            Self::Database(_) | Self::Internal(_) => "Internal server error".to_string(),
            _ => message.clone(),
        };

        let mut response = (
            status,
            Json(json!({
                "error": public_message,
                "code": code,
            })),
        )
            .into_response();
        response
            .extensions_mut()
            .insert(LoggedError { code, message });
        response
    }
}
