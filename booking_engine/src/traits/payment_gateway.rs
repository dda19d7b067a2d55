use log::*;
use serde::Serialize;
use thiserror::Error;

use crate::db_types::{Money, PaymentMethod};

#[derive(Debug, Clone, Serialize)]
pub struct CaptureRequest {
    /// Repeating a capture with the same key must not charge twice. The booking id is used.
    pub idempotency_key: String,
    pub amount: Money,
    pub method: PaymentMethod,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaptureConfirmation {
    pub reference: String,
}

#[derive(Debug, Clone, Error)]
pub enum PaymentGatewayError {
    #[error("The payment was declined: {0}")]
    Declined(String),
    #[error("The payment gateway is unavailable: {0}")]
    Unavailable(String),
    #[error("The payment method {0} is not supported by this gateway")]
    UnsupportedMethod(PaymentMethod),
}

/// The external payment capture collaborator.
#[allow(async_fn_in_trait)]
pub trait PaymentGateway: Clone {
    async fn capture(&self, request: CaptureRequest) -> Result<CaptureConfirmation, PaymentGatewayError>;
}

/// A gateway for money collected offline (cash). It records the collection and never fails.
#[derive(Debug, Clone, Default)]
pub struct RecordOnlyGateway;

impl PaymentGateway for RecordOnlyGateway {
    async fn capture(&self, request: CaptureRequest) -> Result<CaptureConfirmation, PaymentGatewayError> {
        debug!("💰️ Recording offline {} collection of {} for {}", request.method, request.amount, request.idempotency_key);
        Ok(CaptureConfirmation { reference: format!("offline-{}", request.idempotency_key) })
    }
}
