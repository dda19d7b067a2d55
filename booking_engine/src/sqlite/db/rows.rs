//! Row mappings for records that do not map one-to-one onto their table columns.
use std::error::Error as StdError;

use sqlx::{sqlite::SqliteRow, FromRow, Row};
use svc_common::Secret;

use crate::db_types::{Actor, Booking, BookingEvent, GeoPoint, Location, Provider, ServiceCategory};

fn decode_err<E>(column: &'static str) -> impl FnOnce(E) -> sqlx::Error
where E: StdError + Send + Sync + 'static {
    move |e| sqlx::Error::ColumnDecode { index: column.to_string(), source: Box::new(e) }
}

fn point(row: &SqliteRow) -> Result<GeoPoint, sqlx::Error> {
    GeoPoint::new(row.try_get("latitude")?, row.try_get("longitude")?).map_err(decode_err("latitude"))
}

fn actor(row: &SqliteRow, column: &'static str) -> Result<Option<Actor>, sqlx::Error> {
    row.try_get::<Option<String>, _>(column)?.map(|s| s.parse::<Actor>()).transpose().map_err(decode_err(column))
}

impl<'r> FromRow<'r, SqliteRow> for Booking {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let category = row.try_get::<String, _>("category")?.parse::<ServiceCategory>().map_err(decode_err("category"))?;
        let location = Location { point: point(row)?, address: row.try_get("address")? };
        Ok(Self {
            id: row.try_get("id")?,
            customer_id: row.try_get("customer_id")?,
            category,
            price: row.try_get("price")?,
            location,
            status: row.try_get("status")?,
            provider_id: row.try_get("provider_id")?,
            handoff_code: row.try_get::<Option<String>, _>("handoff_code")?.map(Secret::new),
            handoff_attempts: row.try_get("handoff_attempts")?,
            final_amount: row.try_get("final_amount")?,
            cancelled_by: actor(row, "cancelled_by")?,
            version: row.try_get("version")?,
            created_at: row.try_get("created_at")?,
            status_changed_at: row.try_get("status_changed_at")?,
            expires_at: row.try_get("expires_at")?,
        })
    }
}

impl<'r> FromRow<'r, SqliteRow> for Provider {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let categories = row
            .try_get::<String, _>("categories")?
            .split(',')
            .filter(|c| !c.is_empty())
            .map(|c| c.parse::<ServiceCategory>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(decode_err("categories"))?;
        Ok(Self {
            id: row.try_get("id")?,
            display_name: row.try_get("display_name")?,
            categories,
            position: point(row)?,
            service_radius_km: row.try_get("service_radius_km")?,
            is_active: row.try_get("is_active")?,
            tier: row.try_get("tier")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl<'r> FromRow<'r, SqliteRow> for BookingEvent {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let actor = actor(row, "actor")?.ok_or_else(|| sqlx::Error::ColumnNotFound("actor".into()))?;
        Ok(Self {
            id: row.try_get("id")?,
            booking_id: row.try_get("booking_id")?,
            version: row.try_get("version")?,
            from_status: row.try_get("from_status")?,
            to_status: row.try_get("to_status")?,
            actor,
            note: row.try_get("note")?,
            created_at: row.try_get("created_at")?,
        })
    }
}
