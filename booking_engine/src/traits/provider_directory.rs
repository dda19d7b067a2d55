use chrono::{DateTime, Utc};

use crate::{
    booking_api::errors::BookingError,
    db_types::{GeoPoint, NewProvider, Provider, ProviderEarnings, ProviderId, ProviderReputation, ServiceCategory},
};

/// The provider directory consumed by eligibility and settlement.
#[allow(async_fn_in_trait)]
pub trait ProviderDirectory {
    /// Inserts the provider, or replaces its details (including the category list) if it already exists. Active
    /// status is left untouched on update.
    async fn register_provider(&self, provider: NewProvider, at: DateTime<Utc>) -> Result<Provider, BookingError>;

    async fn fetch_provider(&self, provider_id: &ProviderId) -> Result<Option<Provider>, BookingError>;

    async fn set_provider_active(
        &self,
        provider_id: &ProviderId,
        active: bool,
        at: DateTime<Utc>,
    ) -> Result<Provider, BookingError>;

    /// Active providers that declare the category. Distance filtering is done by the caller.
    async fn fetch_active_providers_for_category(&self, category: &ServiceCategory) -> Result<Vec<Provider>, BookingError>;

    async fn update_provider_position(
        &self,
        provider_id: &ProviderId,
        position: GeoPoint,
        at: DateTime<Utc>,
    ) -> Result<(), BookingError>;

    async fn fetch_reputation(&self, provider_id: &ProviderId) -> Result<Option<ProviderReputation>, BookingError>;

    async fn fetch_earnings(&self, provider_id: &ProviderId) -> Result<Option<ProviderEarnings>, BookingError>;
}
