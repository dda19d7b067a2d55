use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::db_types::{BookingId, NewReceipt, NewRating, PaymentMethod, Rating, Receipt};

pub async fn insert_receipt(receipt: NewReceipt, conn: &mut SqliteConnection) -> Result<Receipt, sqlx::Error> {
    let receipt = sqlx::query_as(
        r#"
            INSERT INTO payments (booking_id, provider_id, amount, status, commission, provider_earnings, created_at)
            VALUES ($1, $2, $3, 'PENDING', $4, $5, $6)
            RETURNING *;
        "#,
    )
    .bind(receipt.booking_id)
    .bind(receipt.provider_id)
    .bind(receipt.amount)
    .bind(receipt.commission)
    .bind(receipt.provider_earnings)
    .bind(receipt.created_at)
    .fetch_one(conn)
    .await?;
    Ok(receipt)
}

pub async fn fetch_receipt(booking_id: &BookingId, conn: &mut SqliteConnection) -> Result<Option<Receipt>, sqlx::Error> {
    let receipt =
        sqlx::query_as("SELECT * FROM payments WHERE booking_id = $1").bind(booking_id).fetch_optional(conn).await?;
    Ok(receipt)
}

/// Records a failed capture against a receipt that has not been captured yet.
pub async fn record_failed_attempt(
    booking_id: &BookingId,
    method: PaymentMethod,
    error: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Receipt>, sqlx::Error> {
    let receipt = sqlx::query_as(
        r#"
            UPDATE payments SET method = $2, attempts = attempts + 1, last_error = $3
            WHERE booking_id = $1 AND status = 'PENDING'
            RETURNING *;
        "#,
    )
    .bind(booking_id)
    .bind(method)
    .bind(error)
    .fetch_optional(conn)
    .await?;
    Ok(receipt)
}

pub async fn mark_captured(
    booking_id: &BookingId,
    method: PaymentMethod,
    reference: &str,
    at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Receipt>, sqlx::Error> {
    let receipt = sqlx::query_as(
        r#"
            UPDATE payments
            SET method = $2, status = 'CAPTURED', gateway_reference = $3, attempts = attempts + 1, last_error = NULL,
                captured_at = $4
            WHERE booking_id = $1 AND status = 'PENDING'
            RETURNING *;
        "#,
    )
    .bind(booking_id)
    .bind(method)
    .bind(reference)
    .bind(at)
    .fetch_optional(conn)
    .await?;
    Ok(receipt)
}

/// Inserts the rating unless the booking already has one, in which case `None` is returned.
pub async fn insert_rating(rating: NewRating, conn: &mut SqliteConnection) -> Result<Option<Rating>, sqlx::Error> {
    let rating = sqlx::query_as(
        r#"
            INSERT INTO ratings (booking_id, provider_id, customer_id, rating, comment, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (booking_id) DO NOTHING
            RETURNING *;
        "#,
    )
    .bind(rating.booking_id)
    .bind(rating.provider_id)
    .bind(rating.customer_id)
    .bind(rating.rating)
    .bind(rating.comment)
    .bind(rating.created_at)
    .fetch_optional(conn)
    .await?;
    Ok(rating)
}

pub async fn fetch_rating(booking_id: &BookingId, conn: &mut SqliteConnection) -> Result<Option<Rating>, sqlx::Error> {
    let rating =
        sqlx::query_as("SELECT * FROM ratings WHERE booking_id = $1").bind(booking_id).fetch_optional(conn).await?;
    Ok(rating)
}
