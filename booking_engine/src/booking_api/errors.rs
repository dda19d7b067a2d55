use thiserror::Error;

use crate::db_types::{BookingId, BookingStatusType, ProviderId};

#[derive(Debug, Clone, Error)]
pub enum BookingError {
    #[error("We have an internal database engine (configuration/uptime etc.) error: {0}")]
    DatabaseError(String),
    #[error("The requested booking {0} does not exist")]
    BookingNotFound(BookingId),
    #[error("The requested provider {0} does not exist")]
    ProviderNotFound(ProviderId),
    #[error("Illegal booking transition from {from} to {to}")]
    IllegalTransition { from: BookingStatusType, to: BookingStatusType },
    #[error("The booking has changed since it was read. Expected version {expected}, but it is at version {actual}")]
    StaleVersion { expected: i64, actual: i64 },
    #[error("Provider {0} is not assigned to this booking")]
    NotAssignedProvider(ProviderId),
    #[error("Customer {0} does not own this booking")]
    NotBookingCustomer(String),
    #[error("The provider has no pending offer for this booking")]
    OfferNotPending,
    #[error("Cannot {action} while the booking is {status}")]
    InvalidState { status: BookingStatusType, action: &'static str },
    #[error("Duplicate operation. {0}")]
    DuplicateOperation(String),
    #[error("Ratings must be between 1 and 5, not {0}")]
    InvalidRating(u8),
    #[error("Payment capture failed. The booking is still awaiting payment and the capture can be retried. {0}")]
    PaymentCaptureFailed(String),
    #[error("Conflicting concurrent update. {0}")]
    Conflict(String),
    #[error("Invalid input. {0}")]
    InvalidInput(String),
}

impl BookingError {
    /// Whether a caller may reasonably retry the same operation after re-reading the booking.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StaleVersion { .. } | Self::PaymentCaptureFailed(_) | Self::Conflict(_))
    }
}

impl From<sqlx::Error> for BookingError {
    fn from(e: sqlx::Error) -> Self {
        BookingError::DatabaseError(e.to_string())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(BookingError::StaleVersion { expected: 2, actual: 3 }.is_retryable());
        assert!(BookingError::PaymentCaptureFailed("card declined".into()).is_retryable());
        assert!(!BookingError::DuplicateOperation("already rated".into()).is_retryable());
        let e = BookingError::IllegalTransition { from: BookingStatusType::Paid, to: BookingStatusType::Cancelled };
        assert!(!e.is_retryable());
        assert_eq!(e.to_string(), "Illegal booking transition from PAID to CANCELLED");
    }
}
