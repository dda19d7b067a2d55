use crate::{
    booking_api::errors::BookingError,
    db_types::{Booking, BookingEvent, BookingId, Offer, ProviderId, Rating, Receipt},
};

/// Read-only queries over bookings and their satellite records.
#[allow(async_fn_in_trait)]
pub trait BookingManagement {
    async fn fetch_booking(&self, booking_id: &BookingId) -> Result<Option<Booking>, BookingError>;

    /// All offers for the booking, closest provider first.
    async fn fetch_offers_for_booking(&self, booking_id: &BookingId) -> Result<Vec<Offer>, BookingError>;

    /// A provider's offer inbox, newest first.
    async fn fetch_offers_for_provider(&self, provider_id: &ProviderId, only_pending: bool) -> Result<Vec<Offer>, BookingError>;

    /// The lifecycle audit log, in version order.
    async fn fetch_booking_history(&self, booking_id: &BookingId) -> Result<Vec<BookingEvent>, BookingError>;

    async fn fetch_receipt(&self, booking_id: &BookingId) -> Result<Option<Receipt>, BookingError>;

    async fn fetch_rating(&self, booking_id: &BookingId) -> Result<Option<Rating>, BookingError>;
}
