use log::*;
use sqlx::SqliteConnection;

use crate::db_types::{Actor, Booking, BookingEvent, BookingId, BookingStatusType};

/// Appends the audit event for the transition that produced `booking`. (booking, version) is unique, so two
/// transitions can never be recorded against the same version.
pub async fn insert_event(
    booking: &Booking,
    from: Option<BookingStatusType>,
    actor: &Actor,
    note: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<BookingEvent, sqlx::Error> {
    let event: BookingEvent = sqlx::query_as(
        r#"
            INSERT INTO booking_events (booking_id, version, from_status, to_status, actor, note, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *;
        "#,
    )
    .bind(&booking.id)
    .bind(booking.version)
    .bind(from)
    .bind(booking.status)
    .bind(actor.to_string())
    .bind(note)
    .bind(booking.status_changed_at)
    .fetch_one(conn)
    .await?;
    trace!("🗃️ History event #{} recorded for booking {} v{}", event.id, event.booking_id, event.version);
    Ok(event)
}

pub async fn fetch_history(booking_id: &BookingId, conn: &mut SqliteConnection) -> Result<Vec<BookingEvent>, sqlx::Error> {
    let events = sqlx::query_as("SELECT * FROM booking_events WHERE booking_id = $1 ORDER BY version ASC")
        .bind(booking_id)
        .fetch_all(conn)
        .await?;
    Ok(events)
}
