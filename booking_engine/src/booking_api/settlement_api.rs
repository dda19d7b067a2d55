use std::fmt::Debug;

use log::*;

use crate::{
    booking_api::{booking_objects::TransitionRequest, errors::BookingError, EngineContext},
    db_types::{
        Actor,
        Booking,
        BookingId,
        BookingStatusType,
        Money,
        NewRating,
        NewReceipt,
        PaymentMethod,
        ProviderId,
        ProviderReputation,
        Rating,
        Receipt,
    },
    traits::{BookingDatabase, CaptureRequest, PaymentGateway, RecordOnlyGateway},
};

/// `SettlementApi` handles everything after the work is done: the receipt, payment capture and the customer's rating.
///
/// Card and UPI payments go through the configured [`PaymentGateway`]. Cash is collected by the provider and only
/// recorded.
pub struct SettlementApi<B, G> {
    db: B,
    ctx: EngineContext,
    gateway: G,
    offline: RecordOnlyGateway,
}

impl<B, G> Debug for SettlementApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SettlementApi")
    }
}

impl<B, G> SettlementApi<B, G> {
    pub fn new(db: B, ctx: EngineContext, gateway: G) -> Self {
        Self { db, ctx, gateway, offline: RecordOnlyGateway }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B, G> SettlementApi<B, G>
where
    B: BookingDatabase,
    G: PaymentGateway,
{
    /// COMPLETED -> PAYMENT_PENDING, issuing the receipt for `final_amount`.
    pub async fn finalize(&self, booking_id: &BookingId, final_amount: Money) -> Result<Receipt, BookingError> {
        let booking = self.fetch_booking(booking_id).await?;
        let (_, receipt) = finalize_completed(&self.db, &self.ctx, &booking, final_amount).await?;
        Ok(receipt)
    }

    /// Captures payment for a booking awaiting payment.
    ///
    /// The booking id is the idempotency key, so retrying after an ambiguous gateway failure never charges twice. A
    /// failed capture is recorded against the receipt and leaves the booking in PAYMENT_PENDING.
    pub async fn capture_payment(&self, booking_id: &BookingId, method: PaymentMethod) -> Result<Receipt, BookingError> {
        let booking = self.fetch_booking(booking_id).await?;
        match booking.status {
            BookingStatusType::PaymentPending => {},
            BookingStatusType::Paid => {
                return Err(BookingError::DuplicateOperation(format!("Booking {booking_id} has already been paid")))
            },
            status => return Err(BookingError::InvalidState { status, action: "capture payment" }),
        }
        let receipt = self
            .db
            .fetch_receipt(booking_id)
            .await?
            .ok_or_else(|| BookingError::Conflict(format!("Booking {booking_id} is awaiting payment but has no receipt")))?;
        let request = CaptureRequest { idempotency_key: booking_id.to_string(), amount: receipt.amount, method };
        trace!("💰️ Capturing {} by {method} for booking {booking_id}", receipt.amount);
        let captured = match method {
            PaymentMethod::Cash => self.offline.capture(request).await,
            _ => self.gateway.capture(request).await,
        };
        let confirmation = match captured {
            Ok(c) => c,
            Err(e) => {
                let reason = e.to_string();
                let receipt = self.db.record_capture_failure(booking_id, method, &reason).await?;
                warn!("💰️ Payment capture for booking {booking_id} failed (attempt {}). {reason}", receipt.attempts);
                return Err(BookingError::PaymentCaptureFailed(reason));
            },
        };
        let actor = Actor::Customer(booking.customer_id.clone());
        let request = TransitionRequest::new(&booking, BookingStatusType::Paid, actor.clone(), self.ctx.now())
            .with_note(format!("{method} {}", confirmation.reference));
        let (paid, receipt) = match self.db.settle_payment(request, method, &confirmation.reference).await {
            Ok(settled) => settled,
            Err(BookingError::StaleVersion { .. }) => {
                return match self.db.fetch_booking(booking_id).await? {
                    Some(b) if b.status == BookingStatusType::Paid => Err(BookingError::DuplicateOperation(format!(
                        "Booking {booking_id} was paid by a concurrent capture"
                    ))),
                    _ => Err(BookingError::Conflict(format!("Booking {booking_id} changed during payment capture"))),
                };
            },
            Err(e) => return Err(e),
        };
        info!("💰️ Booking {booking_id} paid. {} captured by {method}, reference {}", receipt.amount, confirmation.reference);
        self.ctx.events.booking_changed(&paid, Some(BookingStatusType::PaymentPending), &actor).await;
        Ok(receipt)
    }

    /// Records the customer's rating of the provider. A booking can be rated once.
    pub async fn submit_rating(
        &self,
        booking_id: &BookingId,
        rating: u8,
        comment: Option<String>,
    ) -> Result<(Rating, ProviderReputation), BookingError> {
        if !(1..=5).contains(&rating) {
            return Err(BookingError::InvalidRating(rating));
        }
        let booking = self.fetch_booking(booking_id).await?;
        if !booking.status.is_rateable() {
            return Err(BookingError::InvalidState { status: booking.status, action: "rate the provider" });
        }
        let provider_id = bound_provider(&booking)?;
        let new_rating = NewRating {
            booking_id: booking.id.clone(),
            provider_id,
            customer_id: booking.customer_id.clone(),
            rating,
            comment: comment.filter(|c| !c.trim().is_empty()),
            created_at: self.ctx.now(),
        };
        match self.db.insert_rating(new_rating).await? {
            Some(rated) => {
                info!("💰️ Booking {booking_id} rated {rating}");
                Ok(rated)
            },
            None => Err(BookingError::DuplicateOperation(format!("Booking {booking_id} has already been rated"))),
        }
    }

    pub async fn fetch_receipt(&self, booking_id: &BookingId) -> Result<Option<Receipt>, BookingError> {
        self.db.fetch_receipt(booking_id).await
    }

    async fn fetch_booking(&self, booking_id: &BookingId) -> Result<Booking, BookingError> {
        self.db.fetch_booking(booking_id).await?.ok_or_else(|| BookingError::BookingNotFound(booking_id.clone()))
    }
}

/// COMPLETED -> PAYMENT_PENDING. Works out the platform commission from the provider's tier and issues the receipt.
pub(crate) async fn finalize_completed<B: BookingDatabase>(
    db: &B,
    ctx: &EngineContext,
    booking: &Booking,
    final_amount: Money,
) -> Result<(Booking, Receipt), BookingError> {
    if booking.status != BookingStatusType::Completed {
        return Err(BookingError::InvalidState { status: booking.status, action: "finalize" });
    }
    if final_amount.is_negative() {
        return Err(BookingError::InvalidInput(format!("The final amount cannot be negative: {final_amount}")));
    }
    let provider_id = bound_provider(booking)?;
    let tier = db.fetch_provider(&provider_id).await?.map(|p| p.tier).unwrap_or_default();
    let at = ctx.now();
    let receipt = NewReceipt::new(booking.id.clone(), provider_id, final_amount, tier, at);
    let request = TransitionRequest::new(booking, BookingStatusType::PaymentPending, Actor::System, at);
    let (finalized, receipt) = db.finalize_booking(request, receipt).await?;
    debug!(
        "💰️ Receipt issued for booking {}. {} of which {} is commission",
        finalized.id, receipt.amount, receipt.commission
    );
    ctx.events.booking_changed(&finalized, Some(BookingStatusType::Completed), &Actor::System).await;
    Ok((finalized, receipt))
}

fn bound_provider(booking: &Booking) -> Result<ProviderId, BookingError> {
    booking
        .provider_id
        .clone()
        .ok_or_else(|| BookingError::Conflict(format!("Booking {} has no provider bound to it", booking.id)))
}
