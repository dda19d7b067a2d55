use serde::Serialize;

use crate::db_types::{Actor, Booking, BookingStatusType, Offer};

/// A dispatch round has opened. Deliver each offer to its provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OffersCreatedEvent {
    pub booking: Booking,
    pub offers: Vec<Offer>,
}

impl OffersCreatedEvent {
    pub fn new(booking: Booking, offers: Vec<Offer>) -> Self {
        Self { booking, offers }
    }
}

/// A booking transition has been committed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookingStatusChangedEvent {
    pub booking: Booking,
    /// `None` when the booking was just created
    pub previous: Option<BookingStatusType>,
    pub actor: Actor,
}

impl BookingStatusChangedEvent {
    pub fn new(booking: Booking, previous: Option<BookingStatusType>, actor: Actor) -> Self {
        Self { booking, previous, actor }
    }

    pub fn customer_message(&self) -> &'static str {
        self.booking.status.customer_message()
    }
}
