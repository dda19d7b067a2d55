use chrono::{DateTime, Utc};
use log::*;
use sqlx::SqliteConnection;

use crate::{
    booking_api::booking_objects::Candidate,
    db_types::{BookingId, Offer, ProviderId},
};

/// Creates one PENDING offer per candidate. Candidates are expected in rank order.
pub async fn insert_offers(
    booking_id: &BookingId,
    candidates: &[Candidate],
    deadline: DateTime<Utc>,
    at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<Offer>, sqlx::Error> {
    let mut offers = Vec::with_capacity(candidates.len());
    for (i, candidate) in candidates.iter().enumerate() {
        #[allow(clippy::cast_possible_wrap)]
        let rank = i as i64 + 1;
        let offer: Offer = sqlx::query_as(
            r#"
                INSERT INTO offers (booking_id, provider_id, status, distance_km, rank, deadline, created_at, updated_at)
                VALUES ($1, $2, 'PENDING', $3, $4, $5, $6, $6)
                RETURNING *;
            "#,
        )
        .bind(booking_id)
        .bind(&candidate.provider_id)
        .bind(candidate.distance_km)
        .bind(rank)
        .bind(deadline)
        .bind(at)
        .fetch_one(&mut *conn)
        .await?;
        offers.push(offer);
    }
    trace!("🗃️ {} offers created for booking {booking_id}", offers.len());
    Ok(offers)
}

/// The winner's offer becomes ACCEPTED and every other pending offer REJECTED.
pub async fn resolve_round(
    booking_id: &BookingId,
    winner: &ProviderId,
    at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
            UPDATE offers
            SET status = CASE WHEN provider_id = $2 THEN 'ACCEPTED' ELSE 'REJECTED' END, updated_at = $3
            WHERE booking_id = $1 AND status = 'PENDING';
        "#,
    )
    .bind(booking_id)
    .bind(winner)
    .bind(at)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

pub async fn expire_pending(booking_id: &BookingId, at: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let result =
        sqlx::query("UPDATE offers SET status = 'EXPIRED', updated_at = $2 WHERE booking_id = $1 AND status = 'PENDING'")
            .bind(booking_id)
            .bind(at)
            .execute(conn)
            .await?;
    Ok(result.rows_affected())
}

/// Moves the provider's pending offer to DECLINED. Returns `None` if there was no pending offer.
pub async fn decline_offer(
    booking_id: &BookingId,
    provider_id: &ProviderId,
    at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Offer>, sqlx::Error> {
    let offer = sqlx::query_as(
        r#"
            UPDATE offers SET status = 'DECLINED', updated_at = $3
            WHERE booking_id = $1 AND provider_id = $2 AND status = 'PENDING'
            RETURNING *;
        "#,
    )
    .bind(booking_id)
    .bind(provider_id)
    .bind(at)
    .fetch_optional(conn)
    .await?;
    Ok(offer)
}

pub async fn fetch_offer(
    booking_id: &BookingId,
    provider_id: &ProviderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Offer>, sqlx::Error> {
    let offer = sqlx::query_as("SELECT * FROM offers WHERE booking_id = $1 AND provider_id = $2")
        .bind(booking_id)
        .bind(provider_id)
        .fetch_optional(conn)
        .await?;
    Ok(offer)
}

pub async fn fetch_offers_for_booking(booking_id: &BookingId, conn: &mut SqliteConnection) -> Result<Vec<Offer>, sqlx::Error> {
    let offers = sqlx::query_as("SELECT * FROM offers WHERE booking_id = $1 ORDER BY rank ASC")
        .bind(booking_id)
        .fetch_all(conn)
        .await?;
    Ok(offers)
}

pub async fn fetch_offers_for_provider(
    provider_id: &ProviderId,
    only_pending: bool,
    conn: &mut SqliteConnection,
) -> Result<Vec<Offer>, sqlx::Error> {
    let sql = if only_pending {
        "SELECT * FROM offers WHERE provider_id = $1 AND status = 'PENDING' ORDER BY id DESC"
    } else {
        "SELECT * FROM offers WHERE provider_id = $1 ORDER BY id DESC"
    };
    let offers = sqlx::query_as(sql).bind(provider_id).fetch_all(conn).await?;
    Ok(offers)
}
