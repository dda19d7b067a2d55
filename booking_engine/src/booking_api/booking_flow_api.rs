use std::fmt::Debug;

use chrono::{DateTime, Utc};
use futures_util::stream::BoxStream;
use log::*;
use svc_common::Secret;

use crate::{
    booking_api::{
        booking_objects::{AcceptOutcome, DeclineResult, DispatchRound, HandoffOutcome, TransitionRequest},
        eligibility::find_candidates,
        errors::BookingError,
        settlement_api::finalize_completed,
        EngineContext,
    },
    clock::offer_deadline,
    db_types::{
        Actor,
        Booking,
        BookingEvent,
        BookingId,
        BookingStatusType,
        CustomerId,
        GeoPoint,
        Money,
        NewBooking,
        Offer,
        OfferStatusType,
        ProviderId,
    },
    events::StatusSnapshot,
    helpers::new_handoff_code,
    traits::BookingDatabase,
};

use BookingStatusType::*;

/// `BookingFlowApi` is the primary API of the engine. It carries a booking from the customer's request through
/// dispatch, the accept race, the on-site handoff and completion.
///
/// Every state change is a single guarded write against the version the API has just read. If another caller got
/// there first, the operation fails with [`BookingError::StaleVersion`] and the caller decides whether to re-read and
/// try again. The API never retries on its own.
pub struct BookingFlowApi<B> {
    db: B,
    ctx: EngineContext,
}

impl<B> Debug for BookingFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BookingFlowApi")
    }
}

impl<B> BookingFlowApi<B> {
    pub fn new(db: B, ctx: EngineContext) -> Self {
        Self { db, ctx }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn context(&self) -> &EngineContext {
        &self.ctx
    }
}

impl<B> BookingFlowApi<B>
where B: BookingDatabase
{
    //------------------------------------------   Request & dispatch   ----------------------------------------------
    /// Stores a new booking and dispatches it straight away.
    ///
    /// The returned round holds the booking as it stands after dispatch: DISPATCHING with its offers, or NO_MATCH if
    /// no provider qualified.
    pub async fn create_booking(&self, booking: NewBooking) -> Result<DispatchRound, BookingError> {
        if !booking.location.point.is_valid() {
            return Err(BookingError::InvalidInput("The booking location is not a valid coordinate".into()));
        }
        if booking.price.is_negative() {
            return Err(BookingError::InvalidInput(format!("The price cannot be negative: {}", booking.price)));
        }
        let actor = Actor::Customer(booking.customer_id.clone());
        let booking = self.db.insert_booking(booking, self.ctx.now()).await?;
        info!("📡️ Booking {} requested by {} for {}", booking.id, booking.customer_id, booking.category);
        self.ctx.events.booking_changed(&booking, None, &actor).await;
        self.dispatch(&booking).await
    }

    /// Offers a REQUESTED booking to the nearest eligible providers, or ends it as NO_MATCH if there are none.
    pub async fn dispatch(&self, booking: &Booking) -> Result<DispatchRound, BookingError> {
        if booking.status != Requested {
            return Err(BookingError::InvalidState { status: booking.status, action: "dispatch" });
        }
        let fan_out = self.ctx.config.fan_out;
        let candidates = find_candidates(&self.db, &booking.location.point, &booking.category, fan_out).await?;
        let at = self.ctx.now();
        if candidates.is_empty() {
            let request = TransitionRequest::new(booking, NoMatch, Actor::System, at).with_note("no eligible providers");
            let updated = self.db.transition(request).await?;
            info!("📡️ No {} providers near booking {}. NO_MATCH", booking.category, booking.id);
            self.ctx.events.booking_changed(&updated, Some(booking.status), &Actor::System).await;
            return Ok(DispatchRound { booking: updated, offers: Vec::new() });
        }
        let deadline = offer_deadline(at, self.ctx.config.offer_timeout);
        let note = format!("offered to {} providers", candidates.len());
        let request = TransitionRequest::new(booking, Dispatching, Actor::System, at).with_note(note);
        let (updated, offers) = self.db.open_dispatch_round(request, &candidates, deadline).await?;
        self.ctx.timer.deadline_scheduled();
        info!("📡️ Booking {} offered to {} providers until {deadline}", updated.id, offers.len());
        self.ctx.events.offers_created(&updated, &offers).await;
        self.ctx.events.booking_changed(&updated, Some(booking.status), &Actor::System).await;
        Ok(DispatchRound { booking: updated, offers })
    }

    //------------------------------------------       Accept race        ----------------------------------------------
    /// A provider's attempt to take a booking it was offered.
    ///
    /// The deciding step is one conditional write. Whatever happens next, at most one call per booking ever returns
    /// [`AcceptOutcome::Won`].
    pub async fn accept(&self, booking_id: &BookingId, provider_id: &ProviderId) -> Result<AcceptOutcome, BookingError> {
        let at = self.ctx.now();
        let code = new_handoff_code();
        if let Some(booking) = self.db.try_accept(booking_id, provider_id, &code, at).await? {
            info!("🤝️ Provider {provider_id} won booking {booking_id}");
            let actor = Actor::Provider(provider_id.clone());
            self.ctx.events.booking_changed(&booking, Some(Dispatching), &actor).await;
            return Ok(AcceptOutcome::Won);
        }
        let outcome = self.explain_failed_accept(booking_id, provider_id, at).await?;
        debug!("🤝️ Accept by {provider_id} for booking {booking_id}: {outcome}");
        Ok(outcome)
    }

    async fn explain_failed_accept(
        &self,
        booking_id: &BookingId,
        provider_id: &ProviderId,
        at: DateTime<Utc>,
    ) -> Result<AcceptOutcome, BookingError> {
        let Some(booking) = self.db.fetch_booking(booking_id).await? else {
            return Ok(AcceptOutcome::Invalid);
        };
        let offers = self.db.fetch_offers_for_booking(booking_id).await?;
        let Some(offer) = offers.iter().find(|o| &o.provider_id == provider_id) else {
            warn!("🤝️ Provider {provider_id} tried to accept booking {booking_id} without an offer");
            return Ok(AcceptOutcome::Invalid);
        };
        let outcome = match booking.status {
            NoMatch | Expired => AcceptOutcome::Expired,
            Dispatching if offer.status == OfferStatusType::Declined => AcceptOutcome::Invalid,
            Dispatching if booking.is_overdue(at) => {
                // The sweeper has not got to this one yet
                if let Some(expired) = self.db.expire_dispatch_if_overdue(booking_id, at).await? {
                    self.round_expired(&expired).await;
                    AcceptOutcome::Expired
                } else {
                    match self.db.fetch_booking(booking_id).await?.map(|b| b.status) {
                        Some(NoMatch | Expired) => AcceptOutcome::Expired,
                        _ => AcceptOutcome::Lost,
                    }
                }
            },
            Dispatching => {
                return Err(BookingError::Conflict(format!(
                    "Booking {booking_id} is still open but the accept by {provider_id} did not apply"
                )));
            },
            _ => AcceptOutcome::Lost,
        };
        Ok(outcome)
    }

    /// The provider turns the offer down. If nobody else still holds a pending offer, the round ends as EXPIRED.
    pub async fn decline(&self, booking_id: &BookingId, provider_id: &ProviderId) -> Result<DeclineResult, BookingError> {
        let result = self.db.decline_offer(booking_id, provider_id, self.ctx.now()).await?;
        info!("🤝️ Provider {provider_id} declined booking {booking_id}");
        if let Some(closed) = &result.closed_round {
            self.round_expired(closed).await;
        }
        Ok(result)
    }

    /// Ends every dispatch round whose deadline has passed. Returns the expired bookings.
    pub async fn expire_overdue_dispatches(&self) -> Result<Vec<Booking>, BookingError> {
        let expired = self.db.expire_overdue_dispatches(self.ctx.now()).await?;
        for booking in &expired {
            self.round_expired(booking).await;
        }
        Ok(expired)
    }

    pub async fn next_dispatch_deadline(&self) -> Result<Option<DateTime<Utc>>, BookingError> {
        self.db.next_dispatch_deadline().await
    }

    async fn round_expired(&self, booking: &Booking) {
        info!("🕰️ Nobody accepted booking {} in time. EXPIRED", booking.id);
        self.ctx.events.booking_changed(booking, Some(Dispatching), &Actor::System).await;
    }

    //------------------------------------------     Job progression      ----------------------------------------------
    /// The assigned provider has left for the job.
    pub async fn mark_en_route(&self, booking_id: &BookingId, provider_id: &ProviderId) -> Result<Booking, BookingError> {
        let booking = self.fetch_booking(booking_id).await?;
        ensure_assigned(&booking, provider_id)?;
        let actor = Actor::Provider(provider_id.clone());
        let request = TransitionRequest::new(&booking, EnRoute, actor, self.ctx.now());
        self.transition(request).await
    }

    /// Publishes the assigned provider's live position. This is not a transition and leaves the version alone.
    pub async fn update_position(
        &self,
        booking_id: &BookingId,
        provider_id: &ProviderId,
        position: GeoPoint,
    ) -> Result<StatusSnapshot, BookingError> {
        if !position.is_valid() {
            return Err(BookingError::InvalidInput("The position is not a valid coordinate".into()));
        }
        let booking = self.fetch_booking(booking_id).await?;
        ensure_assigned(&booking, provider_id)?;
        if booking.status != EnRoute {
            return Err(BookingError::InvalidState { status: booking.status, action: "report a position" });
        }
        let at = self.ctx.now();
        self.db.update_provider_position(provider_id, position, at).await?;
        self.ctx.events.position_changed(&booking, position, at);
        trace!("📡️ Provider {provider_id} is at {}, {} for booking {booking_id}", position.lat, position.lon);
        Ok(StatusSnapshot::from_booking(&booking).with_position(position, at))
    }

    /// Checks the code the provider entered on site. The correct code moves the booking to IN_PROGRESS and is used up.
    ///
    /// Wrong codes are counted. Once the configured number of mismatches is reached the gate stays
    /// [`HandoffOutcome::Locked`] without looking at the code again.
    pub async fn verify_handoff(&self, booking_id: &BookingId, code: &str) -> Result<HandoffOutcome, BookingError> {
        let booking = self.fetch_booking(booking_id).await?;
        if !matches!(booking.status, Accepted | EnRoute) {
            debug!("🔑️ Handoff for booking {booking_id} attempted while {}", booking.status);
            return Ok(HandoffOutcome::NotReady);
        }
        let max_attempts = self.ctx.config.handoff_max_attempts;
        if booking.handoff_attempts >= max_attempts {
            warn!("🔑️ Handoff for booking {booking_id} is locked after {} wrong codes", booking.handoff_attempts);
            return Ok(HandoffOutcome::Locked);
        }
        let Some(expected) = booking.handoff_code.clone() else {
            return Ok(HandoffOutcome::NotReady);
        };
        if !expected.matches(code) {
            return match self.db.record_handoff_mismatch(booking_id).await? {
                Some(b) => {
                    warn!(
                        "🔑️ Wrong handoff code for booking {booking_id}. {} of {max_attempts} attempts used",
                        b.handoff_attempts
                    );
                    Ok(HandoffOutcome::Mismatch)
                },
                None => Ok(HandoffOutcome::NotReady),
            };
        }
        let provider = booking.provider_id.clone().map(Actor::Provider).unwrap_or(Actor::System);
        let request = TransitionRequest::new(&booking, InProgress, provider.clone(), self.ctx.now());
        match self.db.consume_handoff_code(request, &expected).await {
            Ok(started) => {
                info!("🔑️ Handoff verified for booking {booking_id}. Work is in progress");
                self.ctx.events.booking_changed(&started, Some(booking.status), &provider).await;
                Ok(HandoffOutcome::Ok)
            },
            Err(BookingError::StaleVersion { .. }) => {
                // Either an EN_ROUTE update slipped in, or a concurrent verify already used the code
                let current = self.fetch_booking(booking_id).await?;
                if matches!(current.status, Accepted | EnRoute) {
                    Err(BookingError::StaleVersion { expected: booking.version, actual: current.version })
                } else {
                    Ok(HandoffOutcome::NotReady)
                }
            },
            Err(e) => Err(e),
        }
    }

    /// The assigned provider has finished the work. The booking moves on to PAYMENT_PENDING automatically.
    ///
    /// Returns the booking as it stands afterwards. If the receipt could not be issued the booking stays COMPLETED
    /// and the error is logged. [`crate::SettlementApi::finalize`] can then be called to issue it.
    pub async fn mark_completed(
        &self,
        booking_id: &BookingId,
        provider_id: &ProviderId,
        final_amount: Money,
    ) -> Result<Booking, BookingError> {
        if final_amount.is_negative() {
            return Err(BookingError::InvalidInput(format!("The final amount cannot be negative: {final_amount}")));
        }
        let booking = self.fetch_booking(booking_id).await?;
        ensure_assigned(&booking, provider_id)?;
        let actor = Actor::Provider(provider_id.clone());
        let request = TransitionRequest::new(&booking, Completed, actor.clone(), self.ctx.now());
        let completed = self.db.complete_booking(request, final_amount).await?;
        info!("📡️ Booking {booking_id} completed by {provider_id} for {final_amount}");
        self.ctx.events.booking_changed(&completed, Some(booking.status), &actor).await;
        match finalize_completed(&self.db, &self.ctx, &completed, final_amount).await {
            Ok((finalized, _)) => Ok(finalized),
            Err(e) => {
                error!("💰️ Booking {booking_id} is complete but its receipt could not be issued. {e}");
                Ok(completed)
            },
        }
    }

    //------------------------------------------       Cancellation       ----------------------------------------------
    /// Cancels a booking that has not started yet.
    ///
    /// Customers may only cancel their own bookings and providers only the jobs assigned to them. Cancelling during
    /// dispatch withdraws every pending offer.
    pub async fn cancel(&self, booking_id: &BookingId, actor: Actor) -> Result<Booking, BookingError> {
        let booking = self.fetch_booking(booking_id).await?;
        match &actor {
            Actor::Customer(id) if id != &booking.customer_id => {
                return Err(BookingError::NotBookingCustomer(id.to_string()));
            },
            Actor::Provider(id) => ensure_assigned(&booking, id)?,
            _ => {},
        }
        let request = TransitionRequest::new(&booking, Cancelled, actor, self.ctx.now());
        let cancelled = self.transition(request).await?;
        info!("📡️ Booking {booking_id} cancelled by {}", cancelled.cancelled_by.as_ref().unwrap_or(&Actor::System));
        Ok(cancelled)
    }

    /// Applies a caller-built transition request and publishes the result.
    pub async fn transition(&self, request: TransitionRequest) -> Result<Booking, BookingError> {
        let from = request.from;
        let actor = request.actor.clone();
        let booking = self.db.transition(request).await?;
        debug!("📡️ Booking {} moved {from} -> {} (v{})", booking.id, booking.status, booking.version);
        self.ctx.events.booking_changed(&booking, Some(from), &actor).await;
        Ok(booking)
    }

    //------------------------------------------         Queries          ----------------------------------------------
    pub async fn fetch_booking(&self, booking_id: &BookingId) -> Result<Booking, BookingError> {
        self.db.fetch_booking(booking_id).await?.ok_or_else(|| BookingError::BookingNotFound(booking_id.clone()))
    }

    pub async fn booking_history(&self, booking_id: &BookingId) -> Result<Vec<BookingEvent>, BookingError> {
        let history = self.db.fetch_booking_history(booking_id).await?;
        if history.is_empty() {
            return Err(BookingError::BookingNotFound(booking_id.clone()));
        }
        Ok(history)
    }

    pub async fn offers_for_booking(&self, booking_id: &BookingId) -> Result<Vec<Offer>, BookingError> {
        self.db.fetch_offers_for_booking(booking_id).await
    }

    /// The handoff code, for the customer who owns the booking to read out on site.
    pub async fn reveal_handoff_code(
        &self,
        booking_id: &BookingId,
        customer_id: &CustomerId,
    ) -> Result<Secret<String>, BookingError> {
        let booking = self.fetch_booking(booking_id).await?;
        if &booking.customer_id != customer_id {
            return Err(BookingError::NotBookingCustomer(customer_id.to_string()));
        }
        booking.handoff_code.ok_or(BookingError::InvalidState { status: booking.status, action: "show the handoff code" })
    }

    /// A live view of the booking. The stream starts with the current state and then follows every change.
    pub async fn subscribe(&self, booking_id: &BookingId) -> Result<BoxStream<'static, StatusSnapshot>, BookingError> {
        let booking = self.fetch_booking(booking_id).await?;
        let mut seed = StatusSnapshot::from_booking(&booking);
        if booking.status == EnRoute {
            if let Some(provider) = booking.provider_id.as_ref() {
                if let Some(p) = self.db.fetch_provider(provider).await? {
                    seed = seed.with_position(p.position, p.updated_at);
                }
            }
        }
        trace!("📡️ New subscriber for booking {booking_id}");
        Ok(self.ctx.events.status_publisher().subscribe(seed))
    }
}

fn ensure_assigned(booking: &Booking, provider_id: &ProviderId) -> Result<(), BookingError> {
    if booking.is_assigned_to(provider_id) {
        Ok(())
    } else {
        Err(BookingError::NotAssignedProvider(provider_id.clone()))
    }
}
