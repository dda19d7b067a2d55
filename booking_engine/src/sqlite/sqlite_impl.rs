//! `SqliteDatabase` is the SQLite implementation of the booking engine backend.
//!
//! It implements all the traits defined in the [`crate::traits`] module. Every write method runs in its own
//! transaction and issues its deciding conditional write first, so SQLite takes the write lock before anything is read
//! and concurrent writers simply queue on the busy timeout.
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use sqlx::{migrate::MigrateError, SqlitePool};
use svc_common::Secret;

use super::db::{bookings, db_url, history, new_pool, offers, providers, settlement};
use crate::{
    booking_api::{
        booking_objects::{Candidate, DeclineResult, TransitionRequest},
        errors::BookingError,
    },
    db_types::{
        Actor,
        Booking,
        BookingEvent,
        BookingId,
        BookingStatusType,
        GeoPoint,
        Money,
        NewBooking,
        NewProvider,
        NewRating,
        NewReceipt,
        Offer,
        PaymentMethod,
        PaymentStatus,
        Provider,
        ProviderEarnings,
        ProviderId,
        ProviderReputation,
        Rating,
        Receipt,
        ServiceCategory,
    },
    lifecycle::check_transition,
    traits::{BookingDatabase, BookingManagement, ProviderDirectory},
};

use bookings::{BookingGuard, BookingUpdate};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

fn expect_target(request: &TransitionRequest, allowed: &[BookingStatusType]) -> Result<(), BookingError> {
    if allowed.contains(&request.to) {
        check_transition(request.from, request.to)
    } else {
        Err(BookingError::InvalidInput(format!("{} cannot be reached through this operation", request.to)))
    }
}

impl BookingManagement for SqliteDatabase {
    async fn fetch_booking(&self, booking_id: &BookingId) -> Result<Option<Booking>, BookingError> {
        let mut conn = self.pool.acquire().await?;
        let booking = bookings::fetch_booking(booking_id, &mut conn).await?;
        Ok(booking)
    }

    async fn fetch_offers_for_booking(&self, booking_id: &BookingId) -> Result<Vec<Offer>, BookingError> {
        let mut conn = self.pool.acquire().await?;
        let offers = offers::fetch_offers_for_booking(booking_id, &mut conn).await?;
        Ok(offers)
    }

    async fn fetch_offers_for_provider(&self, provider_id: &ProviderId, only_pending: bool) -> Result<Vec<Offer>, BookingError> {
        let mut conn = self.pool.acquire().await?;
        let offers = offers::fetch_offers_for_provider(provider_id, only_pending, &mut conn).await?;
        Ok(offers)
    }

    async fn fetch_booking_history(&self, booking_id: &BookingId) -> Result<Vec<BookingEvent>, BookingError> {
        let mut conn = self.pool.acquire().await?;
        let events = history::fetch_history(booking_id, &mut conn).await?;
        Ok(events)
    }

    async fn fetch_receipt(&self, booking_id: &BookingId) -> Result<Option<Receipt>, BookingError> {
        let mut conn = self.pool.acquire().await?;
        let receipt = settlement::fetch_receipt(booking_id, &mut conn).await?;
        Ok(receipt)
    }

    async fn fetch_rating(&self, booking_id: &BookingId) -> Result<Option<Rating>, BookingError> {
        let mut conn = self.pool.acquire().await?;
        let rating = settlement::fetch_rating(booking_id, &mut conn).await?;
        Ok(rating)
    }
}

impl ProviderDirectory for SqliteDatabase {
    async fn register_provider(&self, provider: NewProvider, at: DateTime<Utc>) -> Result<Provider, BookingError> {
        let id = provider.id.clone();
        let mut tx = self.pool.begin().await?;
        providers::upsert_provider(provider, at, &mut tx).await?;
        let provider = providers::fetch_provider(&id, &mut tx).await?.ok_or_else(|| BookingError::ProviderNotFound(id))?;
        tx.commit().await?;
        Ok(provider)
    }

    async fn fetch_provider(&self, provider_id: &ProviderId) -> Result<Option<Provider>, BookingError> {
        let mut conn = self.pool.acquire().await?;
        let provider = providers::fetch_provider(provider_id, &mut conn).await?;
        Ok(provider)
    }

    async fn set_provider_active(
        &self,
        provider_id: &ProviderId,
        active: bool,
        at: DateTime<Utc>,
    ) -> Result<Provider, BookingError> {
        let mut tx = self.pool.begin().await?;
        if !providers::set_active(provider_id, active, at, &mut tx).await? {
            return Err(BookingError::ProviderNotFound(provider_id.clone()));
        }
        let provider = providers::fetch_provider(provider_id, &mut tx)
            .await?
            .ok_or_else(|| BookingError::ProviderNotFound(provider_id.clone()))?;
        tx.commit().await?;
        debug!("🗃️ Provider {provider_id} is now {}", if active { "active" } else { "inactive" });
        Ok(provider)
    }

    async fn fetch_active_providers_for_category(&self, category: &ServiceCategory) -> Result<Vec<Provider>, BookingError> {
        let mut conn = self.pool.acquire().await?;
        let providers = providers::fetch_active_for_category(category, &mut conn).await?;
        Ok(providers)
    }

    async fn update_provider_position(
        &self,
        provider_id: &ProviderId,
        position: GeoPoint,
        at: DateTime<Utc>,
    ) -> Result<(), BookingError> {
        let mut conn = self.pool.acquire().await?;
        if providers::update_position(provider_id, position, at, &mut conn).await? {
            Ok(())
        } else {
            Err(BookingError::ProviderNotFound(provider_id.clone()))
        }
    }

    async fn fetch_reputation(&self, provider_id: &ProviderId) -> Result<Option<ProviderReputation>, BookingError> {
        let mut conn = self.pool.acquire().await?;
        let reputation = providers::fetch_reputation(provider_id, &mut conn).await?;
        Ok(reputation)
    }

    async fn fetch_earnings(&self, provider_id: &ProviderId) -> Result<Option<ProviderEarnings>, BookingError> {
        let mut conn = self.pool.acquire().await?;
        let earnings = providers::fetch_earnings(provider_id, &mut conn).await?;
        Ok(earnings)
    }
}

impl BookingDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_booking(&self, booking: NewBooking, at: DateTime<Utc>) -> Result<Booking, BookingError> {
        let id = BookingId::random();
        let mut tx = self.pool.begin().await?;
        let booking = bookings::insert_booking(&id, booking, at, &mut tx).await?;
        tx.commit().await?;
        Ok(booking)
    }

    async fn open_dispatch_round(
        &self,
        request: TransitionRequest,
        candidates: &[Candidate],
        deadline: DateTime<Utc>,
    ) -> Result<(Booking, Vec<Offer>), BookingError> {
        expect_target(&request, &[BookingStatusType::Dispatching])?;
        if candidates.is_empty() {
            return Err(BookingError::InvalidInput("A dispatch round needs at least one candidate".into()));
        }
        let mut tx = self.pool.begin().await?;
        let guard = BookingGuard::for_request(&request);
        let update = BookingUpdate::to(BookingStatusType::Dispatching, request.at).expires_at(deadline);
        let booking = bookings::apply_transition(&request, guard, update, &mut tx).await?;
        let offers = offers::insert_offers(&booking.id, candidates, deadline, request.at, &mut tx).await?;
        tx.commit().await?;
        Ok((booking, offers))
    }

    async fn transition(&self, request: TransitionRequest) -> Result<Booking, BookingError> {
        use BookingStatusType::*;
        expect_target(&request, &[NoMatch, EnRoute, Cancelled, Expired])?;
        let mut update = BookingUpdate::to(request.to, request.at);
        if request.to == Cancelled {
            update = update.cancelled_by(&request.actor).clear_handoff_code().clear_expiry();
        }
        if request.to == Expired {
            update = update.clear_expiry();
        }
        let mut tx = self.pool.begin().await?;
        let booking = bookings::apply_transition(&request, BookingGuard::for_request(&request), update, &mut tx).await?;
        tx.commit().await?;
        Ok(booking)
    }

    async fn try_accept(
        &self,
        booking_id: &BookingId,
        provider_id: &ProviderId,
        handoff_code: &Secret<String>,
        at: DateTime<Utc>,
    ) -> Result<Option<Booking>, BookingError> {
        let mut tx = self.pool.begin().await?;
        let guard = BookingGuard::status_in(&[BookingStatusType::Dispatching])
            .unassigned()
            .open_at(at)
            .pending_offer_for(provider_id);
        let update = BookingUpdate::to(BookingStatusType::Accepted, at)
            .assign(provider_id)
            .set_handoff_code(handoff_code.reveal())
            .clear_expiry();
        let Some(booking) = bookings::guarded_update(booking_id, guard, update, &mut tx).await? else {
            trace!("🗃️ Accept by {provider_id} for booking {booking_id} did not apply");
            return Ok(None);
        };
        let n = offers::resolve_round(booking_id, provider_id, at, &mut tx).await?;
        let actor = Actor::Provider(provider_id.clone());
        history::insert_event(&booking, Some(BookingStatusType::Dispatching), &actor, None, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Booking {booking_id} bound to provider {provider_id}. {n} offers resolved");
        Ok(Some(booking))
    }

    async fn decline_offer(
        &self,
        booking_id: &BookingId,
        provider_id: &ProviderId,
        at: DateTime<Utc>,
    ) -> Result<DeclineResult, BookingError> {
        let mut tx = self.pool.begin().await?;
        let Some(offer) = offers::decline_offer(booking_id, provider_id, at, &mut tx).await? else {
            return match bookings::fetch_booking(booking_id, &mut tx).await? {
                None => Err(BookingError::BookingNotFound(booking_id.clone())),
                Some(_) => Err(BookingError::OfferNotPending),
            };
        };
        let guard = BookingGuard::status_in(&[BookingStatusType::Dispatching]).no_pending_offers();
        let update = BookingUpdate::to(BookingStatusType::Expired, at).clear_expiry();
        let closed_round = bookings::guarded_update(booking_id, guard, update, &mut tx).await?;
        if let Some(booking) = &closed_round {
            let note = Some("every offer was declined");
            history::insert_event(booking, Some(BookingStatusType::Dispatching), &Actor::System, note, &mut tx).await?;
            debug!("🗃️ Booking {booking_id} expired early. Every provider declined");
        }
        tx.commit().await?;
        Ok(DeclineResult { offer, closed_round })
    }

    async fn expire_overdue_dispatches(&self, at: DateTime<Utc>) -> Result<Vec<Booking>, BookingError> {
        let mut tx = self.pool.begin().await?;
        let expired = bookings::expire_overdue(None, at, &mut tx).await?;
        tx.commit().await?;
        Ok(expired)
    }

    async fn expire_dispatch_if_overdue(
        &self,
        booking_id: &BookingId,
        at: DateTime<Utc>,
    ) -> Result<Option<Booking>, BookingError> {
        let mut tx = self.pool.begin().await?;
        let mut expired = bookings::expire_overdue(Some(booking_id), at, &mut tx).await?;
        tx.commit().await?;
        Ok(expired.pop())
    }

    async fn next_dispatch_deadline(&self) -> Result<Option<DateTime<Utc>>, BookingError> {
        let mut conn = self.pool.acquire().await?;
        let deadline = bookings::next_dispatch_deadline(&mut conn).await?;
        Ok(deadline)
    }

    async fn record_handoff_mismatch(&self, booking_id: &BookingId) -> Result<Option<Booking>, BookingError> {
        let mut conn = self.pool.acquire().await?;
        let booking = bookings::record_handoff_mismatch(booking_id, &mut conn).await?;
        Ok(booking)
    }

    async fn consume_handoff_code(&self, request: TransitionRequest, code: &Secret<String>) -> Result<Booking, BookingError> {
        expect_target(&request, &[BookingStatusType::InProgress])?;
        let mut tx = self.pool.begin().await?;
        let guard = BookingGuard::for_request(&request).handoff_code(code.reveal());
        let update = BookingUpdate::to(BookingStatusType::InProgress, request.at).clear_handoff_code();
        let booking = bookings::apply_transition(&request, guard, update, &mut tx).await?;
        tx.commit().await?;
        Ok(booking)
    }

    async fn complete_booking(&self, request: TransitionRequest, final_amount: Money) -> Result<Booking, BookingError> {
        expect_target(&request, &[BookingStatusType::Completed])?;
        let mut tx = self.pool.begin().await?;
        let update = BookingUpdate::to(BookingStatusType::Completed, request.at).final_amount(final_amount);
        let booking = bookings::apply_transition(&request, BookingGuard::for_request(&request), update, &mut tx).await?;
        tx.commit().await?;
        Ok(booking)
    }

    async fn finalize_booking(
        &self,
        request: TransitionRequest,
        receipt: NewReceipt,
    ) -> Result<(Booking, Receipt), BookingError> {
        expect_target(&request, &[BookingStatusType::PaymentPending])?;
        let mut tx = self.pool.begin().await?;
        let update = BookingUpdate::to(BookingStatusType::PaymentPending, request.at);
        let booking = bookings::apply_transition(&request, BookingGuard::for_request(&request), update, &mut tx).await?;
        let receipt = settlement::insert_receipt(receipt, &mut tx).await?;
        tx.commit().await?;
        Ok((booking, receipt))
    }

    async fn record_capture_failure(
        &self,
        booking_id: &BookingId,
        method: PaymentMethod,
        error: &str,
    ) -> Result<Receipt, BookingError> {
        let mut conn = self.pool.acquire().await?;
        if let Some(receipt) = settlement::record_failed_attempt(booking_id, method, error, &mut conn).await? {
            return Ok(receipt);
        }
        match settlement::fetch_receipt(booking_id, &mut conn).await? {
            Some(r) if r.status == PaymentStatus::Captured => {
                Err(BookingError::DuplicateOperation(format!("Payment for booking {booking_id} has already been captured")))
            },
            _ => Err(BookingError::BookingNotFound(booking_id.clone())),
        }
    }

    async fn settle_payment(
        &self,
        request: TransitionRequest,
        method: PaymentMethod,
        gateway_reference: &str,
    ) -> Result<(Booking, Receipt), BookingError> {
        expect_target(&request, &[BookingStatusType::Paid])?;
        let mut tx = self.pool.begin().await?;
        let update = BookingUpdate::to(BookingStatusType::Paid, request.at);
        let booking = bookings::apply_transition(&request, BookingGuard::for_request(&request), update, &mut tx).await?;
        let receipt = settlement::mark_captured(&booking.id, method, gateway_reference, request.at, &mut tx)
            .await?
            .ok_or_else(|| BookingError::Conflict(format!("Booking {} has no receipt awaiting capture", booking.id)))?;
        let earnings = providers::credit_earnings(&receipt.provider_id, receipt.provider_earnings, request.at, &mut tx).await?;
        tx.commit().await?;
        debug!(
            "🗃️ Booking {} paid. Provider {} has now earned {} over {} jobs",
            booking.id, earnings.provider_id, earnings.total_earned, earnings.paid_jobs
        );
        Ok((booking, receipt))
    }

    async fn insert_rating(&self, rating: NewRating) -> Result<Option<(Rating, ProviderReputation)>, BookingError> {
        let mut tx = self.pool.begin().await?;
        let Some(rating) = settlement::insert_rating(rating, &mut tx).await? else {
            return Ok(None);
        };
        let current = providers::fetch_reputation(&rating.provider_id, &mut tx)
            .await?
            .unwrap_or_else(|| ProviderReputation::new(rating.provider_id.clone(), rating.created_at));
        let updated = current.with_rating(rating.rating, rating.created_at);
        let reputation = providers::save_reputation(&updated, &mut tx).await?;
        tx.commit().await?;
        debug!(
            "🗃️ Provider {} rated {} for booking {}. Average is now {:.2} over {} jobs",
            reputation.provider_id, rating.rating, rating.booking_id, reputation.average_rating, reputation.rated_jobs
        );
        Ok(Some((rating, reputation)))
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the URL in `BKS_DATABASE_URL`
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Brings the schema up to date.
    pub async fn migrate(&self) -> Result<(), MigrateError> {
        sqlx::migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
