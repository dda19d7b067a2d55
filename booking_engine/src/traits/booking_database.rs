use chrono::{DateTime, Utc};
use svc_common::Secret;

use crate::{
    booking_api::{
        booking_objects::{Candidate, DeclineResult, TransitionRequest},
        errors::BookingError,
    },
    db_types::{
        Booking,
        BookingId,
        Money,
        NewBooking,
        NewRating,
        NewReceipt,
        Offer,
        PaymentMethod,
        ProviderId,
        ProviderReputation,
        Rating,
        Receipt,
    },
    traits::{BookingManagement, ProviderDirectory},
};

/// This trait defines the highest level of behaviour for backends supporting the booking engine.
///
/// Every method is a single atomic unit of work. Methods that take a [`TransitionRequest`] perform a compare-and-set
/// on the booking's status and version and fail with
/// * [`BookingError::BookingNotFound`] if the booking does not exist,
/// * [`BookingError::StaleVersion`] if the booking has moved on since the caller read it,
/// * [`BookingError::IllegalTransition`] otherwise.
///
/// Every committed transition bumps the booking version by one and appends one event to the booking history, in the
/// same transaction.
#[allow(async_fn_in_trait)]
pub trait BookingDatabase: Clone + BookingManagement + ProviderDirectory {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Stores a new booking in REQUESTED at version 1.
    async fn insert_booking(&self, booking: NewBooking, at: DateTime<Utc>) -> Result<Booking, BookingError>;

    /// REQUESTED -> DISPATCHING, creating one PENDING offer per candidate with the shared `deadline`.
    async fn open_dispatch_round(
        &self,
        request: TransitionRequest,
        candidates: &[Candidate],
        deadline: DateTime<Utc>,
    ) -> Result<(Booking, Vec<Offer>), BookingError>;

    /// Applies one of the transitions that carry no extra data: NO_MATCH, EN_ROUTE, CANCELLED or EXPIRED.
    ///
    /// Leaving DISPATCHING expires any pending offers. Cancelling records the actor and clears the handoff code.
    async fn transition(&self, request: TransitionRequest) -> Result<Booking, BookingError>;

    /// The accept race. A single conditional write binds `provider_id` to the booking if, and only if, it is
    /// DISPATCHING, unassigned, its offer deadline has not passed and the provider holds a pending offer. The winner's
    /// offer becomes ACCEPTED and every sibling REJECTED in the same transaction.
    ///
    /// Returns `None` if the conditional write did not apply.
    async fn try_accept(
        &self,
        booking_id: &BookingId,
        provider_id: &ProviderId,
        handoff_code: &Secret<String>,
        at: DateTime<Utc>,
    ) -> Result<Option<Booking>, BookingError>;

    /// Marks the provider's pending offer DECLINED. Closes the round (DISPATCHING -> EXPIRED) if it was the last one.
    async fn decline_offer(
        &self,
        booking_id: &BookingId,
        provider_id: &ProviderId,
        at: DateTime<Utc>,
    ) -> Result<DeclineResult, BookingError>;

    /// DISPATCHING -> EXPIRED for every booking whose offer deadline is at or before `at`.
    async fn expire_overdue_dispatches(&self, at: DateTime<Utc>) -> Result<Vec<Booking>, BookingError>;

    /// DISPATCHING -> EXPIRED for a single booking, if its offer deadline has passed.
    async fn expire_dispatch_if_overdue(
        &self,
        booking_id: &BookingId,
        at: DateTime<Utc>,
    ) -> Result<Option<Booking>, BookingError>;

    /// The earliest offer deadline of all bookings still dispatching.
    async fn next_dispatch_deadline(&self) -> Result<Option<DateTime<Utc>>, BookingError>;

    /// Counts a wrong handoff code. Does not change the version. Returns `None` if the booking is not waiting for a
    /// handoff.
    async fn record_handoff_mismatch(&self, booking_id: &BookingId) -> Result<Option<Booking>, BookingError>;

    /// ACCEPTED/EN_ROUTE -> IN_PROGRESS, guarded by the handoff code itself, which is cleared.
    async fn consume_handoff_code(&self, request: TransitionRequest, code: &Secret<String>) -> Result<Booking, BookingError>;

    /// IN_PROGRESS -> COMPLETED, storing the final amount.
    async fn complete_booking(&self, request: TransitionRequest, final_amount: Money) -> Result<Booking, BookingError>;

    /// COMPLETED -> PAYMENT_PENDING, issuing the receipt.
    async fn finalize_booking(
        &self,
        request: TransitionRequest,
        receipt: NewReceipt,
    ) -> Result<(Booking, Receipt), BookingError>;

    /// Records a failed capture against the receipt. The booking is left untouched.
    async fn record_capture_failure(
        &self,
        booking_id: &BookingId,
        method: PaymentMethod,
        error: &str,
    ) -> Result<Receipt, BookingError>;

    /// PAYMENT_PENDING -> PAID. Marks the receipt captured and credits the provider's earnings.
    async fn settle_payment(
        &self,
        request: TransitionRequest,
        method: PaymentMethod,
        gateway_reference: &str,
    ) -> Result<(Booking, Receipt), BookingError>;

    /// Stores the rating and folds it into the provider's reputation. Returns `None` if the booking was already rated.
    async fn insert_rating(&self, rating: NewRating) -> Result<Option<(Rating, ProviderReputation)>, BookingError>;
}
