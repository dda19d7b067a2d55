use chrono::{DateTime, Utc};
use log::*;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use super::{history, offers};
use crate::{
    booking_api::{booking_objects::TransitionRequest, errors::BookingError},
    db_types::{Actor, Booking, BookingId, BookingStatusType, Money, NewBooking, ProviderId},
};

/// Inserts a new booking in REQUESTED at version 1 and writes its creation event.
pub async fn insert_booking(
    id: &BookingId,
    booking: NewBooking,
    at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Booking, BookingError> {
    let actor = Actor::Customer(booking.customer_id.clone());
    let booking: Booking = sqlx::query_as(
        r#"
            INSERT INTO bookings (
                id,
                customer_id,
                category,
                price,
                latitude,
                longitude,
                address,
                status,
                version,
                created_at,
                status_changed_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, 'REQUESTED', 1, $8, $8)
            RETURNING *;
        "#,
    )
    .bind(id)
    .bind(booking.customer_id)
    .bind(booking.category.as_str())
    .bind(booking.price)
    .bind(booking.location.point.lat)
    .bind(booking.location.point.lon)
    .bind(booking.location.address)
    .bind(at)
    .fetch_one(&mut *conn)
    .await?;
    history::insert_event(&booking, None, &actor, None, conn).await?;
    debug!("🗃️ Booking {} inserted for customer {}", booking.id, booking.customer_id);
    Ok(booking)
}

pub async fn fetch_booking(id: &BookingId, conn: &mut SqliteConnection) -> Result<Option<Booking>, sqlx::Error> {
    let booking = sqlx::query_as("SELECT * FROM bookings WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(booking)
}

/// The conditions a booking row must meet for a [`BookingUpdate`] to apply.
#[derive(Debug, Clone, Default)]
pub struct BookingGuard {
    from: Vec<BookingStatusType>,
    version: Option<i64>,
    unassigned: bool,
    assigned_to: Option<ProviderId>,
    open_at: Option<DateTime<Utc>>,
    overdue_at: Option<DateTime<Utc>>,
    handoff_code: Option<String>,
    awaiting_handoff: bool,
    pending_offer_for: Option<ProviderId>,
    no_pending_offers: bool,
}

impl BookingGuard {
    pub fn status_in(statuses: &[BookingStatusType]) -> Self {
        Self { from: statuses.to_vec(), ..Default::default() }
    }

    /// The guard of a plain transition request: same status, same version.
    pub fn for_request(request: &TransitionRequest) -> Self {
        Self::status_in(&[request.from]).at_version(request.expected_version)
    }

    pub fn at_version(mut self, version: i64) -> Self {
        self.version = Some(version);
        self
    }

    pub fn unassigned(mut self) -> Self {
        self.unassigned = true;
        self
    }

    pub fn assigned_to(mut self, provider_id: &ProviderId) -> Self {
        self.assigned_to = Some(provider_id.clone());
        self
    }

    /// The offer deadline is still in the future at `now`.
    pub fn open_at(mut self, now: DateTime<Utc>) -> Self {
        self.open_at = Some(now);
        self
    }

    /// The offer deadline is at or before `now`.
    pub fn overdue_at(mut self, now: DateTime<Utc>) -> Self {
        self.overdue_at = Some(now);
        self
    }

    pub fn handoff_code(mut self, code: &str) -> Self {
        self.handoff_code = Some(code.to_string());
        self
    }

    /// A handoff code is outstanding.
    pub fn awaiting_handoff(mut self) -> Self {
        self.awaiting_handoff = true;
        self
    }

    pub fn pending_offer_for(mut self, provider_id: &ProviderId) -> Self {
        self.pending_offer_for = Some(provider_id.clone());
        self
    }

    pub fn no_pending_offers(mut self) -> Self {
        self.no_pending_offers = true;
        self
    }

    fn push_conditions(self, builder: &mut QueryBuilder<'_, Sqlite>) {
        if !self.from.is_empty() {
            builder.push(" AND status IN (");
            let mut statuses = builder.separated(", ");
            for status in self.from {
                statuses.push_bind(status);
            }
            builder.push(")");
        }
        if let Some(version) = self.version {
            builder.push(" AND version = ").push_bind(version);
        }
        if self.unassigned {
            builder.push(" AND provider_id IS NULL");
        }
        if let Some(provider_id) = self.assigned_to {
            builder.push(" AND provider_id = ").push_bind(provider_id);
        }
        if let Some(now) = self.open_at {
            builder.push(" AND expires_at IS NOT NULL AND julianday(expires_at) > julianday(").push_bind(now).push(")");
        }
        if let Some(now) = self.overdue_at {
            builder.push(" AND expires_at IS NOT NULL AND julianday(expires_at) <= julianday(").push_bind(now).push(")");
        }
        if let Some(code) = self.handoff_code {
            builder.push(" AND handoff_code = ").push_bind(code);
        }
        if self.awaiting_handoff {
            builder.push(" AND handoff_code IS NOT NULL");
        }
        if let Some(provider_id) = self.pending_offer_for {
            builder
                .push(
                    " AND EXISTS (SELECT 1 FROM offers WHERE offers.booking_id = bookings.id AND offers.status = \
                     'PENDING' AND offers.provider_id = ",
                )
                .push_bind(provider_id)
                .push(")");
        }
        if self.no_pending_offers {
            builder.push(
                " AND NOT EXISTS (SELECT 1 FROM offers WHERE offers.booking_id = bookings.id AND offers.status = \
                 'PENDING')",
            );
        }
    }
}

/// The columns a transition writes. Status, version and `status_changed_at` are always written.
#[derive(Debug, Clone)]
pub struct BookingUpdate {
    to: BookingStatusType,
    at: DateTime<Utc>,
    provider_id: Option<ProviderId>,
    handoff_code: Option<Option<String>>,
    reset_handoff_attempts: bool,
    final_amount: Option<Money>,
    cancelled_by: Option<Actor>,
    expires_at: Option<Option<DateTime<Utc>>>,
}

impl BookingUpdate {
    pub fn to(status: BookingStatusType, at: DateTime<Utc>) -> Self {
        Self {
            to: status,
            at,
            provider_id: None,
            handoff_code: None,
            reset_handoff_attempts: false,
            final_amount: None,
            cancelled_by: None,
            expires_at: None,
        }
    }

    pub fn assign(mut self, provider_id: &ProviderId) -> Self {
        self.provider_id = Some(provider_id.clone());
        self
    }

    pub fn set_handoff_code(mut self, code: &str) -> Self {
        self.handoff_code = Some(Some(code.to_string()));
        self.reset_handoff_attempts = true;
        self
    }

    pub fn clear_handoff_code(mut self) -> Self {
        self.handoff_code = Some(None);
        self
    }

    pub fn final_amount(mut self, amount: Money) -> Self {
        self.final_amount = Some(amount);
        self
    }

    pub fn cancelled_by(mut self, actor: &Actor) -> Self {
        self.cancelled_by = Some(actor.clone());
        self
    }

    pub fn expires_at(mut self, deadline: DateTime<Utc>) -> Self {
        self.expires_at = Some(Some(deadline));
        self
    }

    pub fn clear_expiry(mut self) -> Self {
        self.expires_at = Some(None);
        self
    }

    fn push_assignments(self, builder: &mut QueryBuilder<'_, Sqlite>) {
        builder.push("version = version + 1, status = ").push_bind(self.to);
        builder.push(", status_changed_at = ").push_bind(self.at);
        if let Some(provider_id) = self.provider_id {
            builder.push(", provider_id = ").push_bind(provider_id);
        }
        match self.handoff_code {
            Some(Some(code)) => {
                builder.push(", handoff_code = ").push_bind(code);
            },
            Some(None) => {
                builder.push(", handoff_code = NULL");
            },
            None => {},
        }
        if self.reset_handoff_attempts {
            builder.push(", handoff_attempts = 0");
        }
        if let Some(amount) = self.final_amount {
            builder.push(", final_amount = ").push_bind(amount);
        }
        if let Some(actor) = self.cancelled_by {
            builder.push(", cancelled_by = ").push_bind(actor.to_string());
        }
        match self.expires_at {
            Some(Some(deadline)) => {
                builder.push(", expires_at = ").push_bind(deadline);
            },
            Some(None) => {
                builder.push(", expires_at = NULL");
            },
            None => {},
        }
    }
}

/// The single conditional write behind every transition. Returns `None` if the guard did not match.
pub async fn guarded_update(
    id: &BookingId,
    guard: BookingGuard,
    update: BookingUpdate,
    conn: &mut SqliteConnection,
) -> Result<Option<Booking>, sqlx::Error> {
    let mut builder = QueryBuilder::new("UPDATE bookings SET ");
    update.push_assignments(&mut builder);
    builder.push(" WHERE id = ").push_bind(id.clone());
    guard.push_conditions(&mut builder);
    builder.push(" RETURNING *");
    trace!("🗃️ Executing query: {}", builder.sql());
    let booking = builder.build_query_as::<Booking>().fetch_optional(conn).await?;
    Ok(booking)
}

/// Explains why a transition request did not apply.
pub async fn classify_failure(request: &TransitionRequest, conn: &mut SqliteConnection) -> BookingError {
    match fetch_booking(&request.booking_id, conn).await {
        Ok(None) => BookingError::BookingNotFound(request.booking_id.clone()),
        Ok(Some(b)) if b.version != request.expected_version => {
            BookingError::StaleVersion { expected: request.expected_version, actual: b.version }
        },
        Ok(Some(b)) => BookingError::IllegalTransition { from: b.status, to: request.to },
        Err(e) => e.into(),
    }
}

/// Applies a transition request with any extra guard conditions and column updates, and records it in the history.
pub async fn apply_transition(
    request: &TransitionRequest,
    guard: BookingGuard,
    update: BookingUpdate,
    conn: &mut SqliteConnection,
) -> Result<Booking, BookingError> {
    match guarded_update(&request.booking_id, guard, update, &mut *conn).await? {
        Some(booking) => {
            if matches!(booking.status, BookingStatusType::Cancelled | BookingStatusType::Expired | BookingStatusType::NoMatch) {
                let n = offers::expire_pending(&booking.id, request.at, &mut *conn).await?;
                trace!("🗃️ {n} pending offers expired for booking {}", booking.id);
            }
            history::insert_event(&booking, Some(request.from), &request.actor, request.note.as_deref(), conn).await?;
            debug!("🗃️ Booking {} moved {} -> {} (v{})", booking.id, request.from, booking.status, booking.version);
            Ok(booking)
        },
        None => Err(classify_failure(request, conn).await),
    }
}

/// DISPATCHING -> EXPIRED for every overdue booking, or just `only` if given.
pub async fn expire_overdue(
    only: Option<&BookingId>,
    at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<Booking>, BookingError> {
    let mut builder = QueryBuilder::new("UPDATE bookings SET ");
    BookingUpdate::to(BookingStatusType::Expired, at).clear_expiry().push_assignments(&mut builder);
    builder.push(" WHERE 1 = 1");
    if let Some(id) = only {
        builder.push(" AND id = ").push_bind(id.clone());
    }
    BookingGuard::status_in(&[BookingStatusType::Dispatching]).overdue_at(at).push_conditions(&mut builder);
    builder.push(" RETURNING *");
    let expired: Vec<Booking> = builder.build_query_as::<Booking>().fetch_all(&mut *conn).await?;
    for booking in &expired {
        offers::expire_pending(&booking.id, at, &mut *conn).await?;
        let note = Some("offer deadline passed");
        history::insert_event(booking, Some(BookingStatusType::Dispatching), &Actor::System, note, &mut *conn).await?;
        debug!("🗃️ Booking {} expired without an accepted offer", booking.id);
    }
    Ok(expired)
}

pub async fn next_dispatch_deadline(conn: &mut SqliteConnection) -> Result<Option<DateTime<Utc>>, sqlx::Error> {
    let deadline: Option<DateTime<Utc>> = sqlx::query_scalar(
        "SELECT expires_at FROM bookings WHERE status = 'DISPATCHING' AND expires_at IS NOT NULL ORDER BY \
         julianday(expires_at) ASC LIMIT 1",
    )
    .fetch_optional(conn)
    .await?;
    Ok(deadline)
}

/// Bumps the wrong-code counter while a handoff is outstanding. The version is not changed.
pub async fn record_handoff_mismatch(
    id: &BookingId,
    conn: &mut SqliteConnection,
) -> Result<Option<Booking>, sqlx::Error> {
    let booking = sqlx::query_as(
        r#"
            UPDATE bookings SET handoff_attempts = handoff_attempts + 1
            WHERE id = $1 AND status IN ('ACCEPTED', 'EN_ROUTE') AND handoff_code IS NOT NULL
            RETURNING *;
        "#,
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(booking)
}
