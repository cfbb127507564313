//! Boundary to the external payment provider.
//!
//! The provider is trusted: a successful `request_payment` hands back a
//! voucher the client completes with, and the provider later calls back with
//! the order number (see [`crate::services::order::OrderService::confirm_paid`]).
//! Every call is bounded by a timeout; a timeout is reported as a retryable
//! failure and never moves an order.

use async_trait::async_trait;
use chrono::Local;
use rust_decimal::Decimal;
use serde::Serialize;
use std::{future::Future, sync::Mutex, time::Duration};
use thiserror::Error;
use tracing::info;

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct PaymentVoucher {
    pub order_number: String,
    pub amount: Decimal,
    pub nonce: String,
    pub issued_at: String,
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum PaymentError {
    #[error("payment provider timed out after {0:?}")]
    Timeout(Duration),
    #[error("payment provider rejected the request: {0}")]
    Rejected(String),
}

impl PaymentError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn request_payment(
        &self,
        order_number: &str,
        amount: Decimal,
    ) -> Result<PaymentVoucher, PaymentError>;

    async fn refund(&self, order_number: &str, amount: Decimal) -> Result<(), PaymentError>;
}

/// Runs a provider call under `limit`.
pub async fn with_timeout<T, F>(limit: Duration, call: F) -> Result<T, PaymentError>
where
    F: Future<Output = Result<T, PaymentError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(PaymentError::Timeout(limit)),
    }
}

/// In-process provider for the minimal deployment: every request succeeds
/// immediately and refunds are recorded.
#[derive(Default)]
pub struct SimulatedGateway {
    refunds: Mutex<Vec<(String, Decimal)>>,
}

impl SimulatedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refunds(&self) -> Vec<(String, Decimal)> {
        self.refunds
            .lock()
            .map(|refunds| refunds.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn request_payment(
        &self,
        order_number: &str,
        amount: Decimal,
    ) -> Result<PaymentVoucher, PaymentError> {
        let now = Local::now();
        info!(order_number, %amount, "simulated prepay issued");
        Ok(PaymentVoucher {
            order_number: order_number.to_owned(),
            amount,
            nonce: format!("{}{}", order_number, now.timestamp_subsec_micros()),
            issued_at: now.timestamp().to_string(),
        })
    }

    async fn refund(&self, order_number: &str, amount: Decimal) -> Result<(), PaymentError> {
        info!(order_number, %amount, "simulated refund");
        if let Ok(mut refunds) = self.refunds.lock() {
            refunds.push((order_number.to_owned(), amount));
        }
        Ok(())
    }
}
