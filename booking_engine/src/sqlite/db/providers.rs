use chrono::{DateTime, Utc};
use log::*;
use sqlx::SqliteConnection;

use crate::db_types::{
    GeoPoint,
    Money,
    NewProvider,
    Provider,
    ProviderEarnings,
    ProviderId,
    ProviderReputation,
    ServiceCategory,
};

/// Inserts or updates the provider and replaces its category list. Call this inside a transaction.
pub async fn upsert_provider(
    provider: NewProvider,
    at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
            INSERT INTO providers (id, display_name, latitude, longitude, service_radius_km, tier, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            ON CONFLICT (id) DO UPDATE SET
                display_name = excluded.display_name,
                latitude = excluded.latitude,
                longitude = excluded.longitude,
                service_radius_km = excluded.service_radius_km,
                tier = excluded.tier,
                updated_at = excluded.updated_at;
        "#,
    )
    .bind(&provider.id)
    .bind(&provider.display_name)
    .bind(provider.position.lat)
    .bind(provider.position.lon)
    .bind(provider.service_radius_km)
    .bind(provider.tier)
    .bind(at)
    .execute(&mut *conn)
    .await?;
    sqlx::query("DELETE FROM provider_categories WHERE provider_id = $1").bind(&provider.id).execute(&mut *conn).await?;
    for category in &provider.categories {
        sqlx::query("INSERT OR IGNORE INTO provider_categories (provider_id, category) VALUES ($1, $2)")
            .bind(&provider.id)
            .bind(category.as_str())
            .execute(&mut *conn)
            .await?;
    }
    debug!("🗃️ Provider {} saved with {} categories", provider.id, provider.categories.len());
    Ok(())
}

pub async fn fetch_provider(id: &ProviderId, conn: &mut SqliteConnection) -> Result<Option<Provider>, sqlx::Error> {
    let provider = sqlx::query_as("SELECT * FROM provider_directory WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(provider)
}

pub async fn set_active(
    id: &ProviderId,
    active: bool,
    at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE providers SET is_active = $1, updated_at = $2 WHERE id = $3")
        .bind(active)
        .bind(at)
        .bind(id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn fetch_active_for_category(
    category: &ServiceCategory,
    conn: &mut SqliteConnection,
) -> Result<Vec<Provider>, sqlx::Error> {
    let providers = sqlx::query_as(
        r#"
            SELECT * FROM provider_directory
            WHERE is_active = 1 AND id IN (SELECT provider_id FROM provider_categories WHERE category = $1)
            ORDER BY id ASC;
        "#,
    )
    .bind(category.as_str())
    .fetch_all(conn)
    .await?;
    Ok(providers)
}

pub async fn update_position(
    id: &ProviderId,
    position: GeoPoint,
    at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE providers SET latitude = $1, longitude = $2, updated_at = $3 WHERE id = $4")
        .bind(position.lat)
        .bind(position.lon)
        .bind(at)
        .bind(id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn fetch_reputation(
    id: &ProviderId,
    conn: &mut SqliteConnection,
) -> Result<Option<ProviderReputation>, sqlx::Error> {
    let reputation =
        sqlx::query_as("SELECT * FROM provider_reputation WHERE provider_id = $1").bind(id).fetch_optional(conn).await?;
    Ok(reputation)
}

pub async fn save_reputation(reputation: &ProviderReputation, conn: &mut SqliteConnection) -> Result<ProviderReputation, sqlx::Error> {
    let saved = sqlx::query_as(
        r#"
            INSERT INTO provider_reputation (provider_id, rated_jobs, average_rating, updated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (provider_id) DO UPDATE SET
                rated_jobs = excluded.rated_jobs,
                average_rating = excluded.average_rating,
                updated_at = excluded.updated_at
            RETURNING *;
        "#,
    )
    .bind(&reputation.provider_id)
    .bind(reputation.rated_jobs)
    .bind(reputation.average_rating)
    .bind(reputation.updated_at)
    .fetch_one(conn)
    .await?;
    Ok(saved)
}

pub async fn fetch_earnings(id: &ProviderId, conn: &mut SqliteConnection) -> Result<Option<ProviderEarnings>, sqlx::Error> {
    let earnings =
        sqlx::query_as("SELECT * FROM provider_earnings WHERE provider_id = $1").bind(id).fetch_optional(conn).await?;
    Ok(earnings)
}

/// Adds one paid job worth `amount` to the provider's ledger.
pub async fn credit_earnings(
    id: &ProviderId,
    amount: Money,
    at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<ProviderEarnings, sqlx::Error> {
    let earnings = sqlx::query_as(
        r#"
            INSERT INTO provider_earnings (provider_id, total_earned, paid_jobs, updated_at)
            VALUES ($1, $2, 1, $3)
            ON CONFLICT (provider_id) DO UPDATE SET
                total_earned = total_earned + excluded.total_earned,
                paid_jobs = paid_jobs + 1,
                updated_at = excluded.updated_at
            RETURNING *;
        "#,
    )
    .bind(id)
    .bind(amount)
    .bind(at)
    .fetch_one(conn)
    .await?;
    trace!("🗃️ Provider {id} credited with {amount}");
    Ok(earnings)
}
