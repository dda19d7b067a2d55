use std::fmt::Debug;

use log::*;

use crate::{
    booking_api::{booking_objects::Candidate, eligibility::find_candidates, errors::BookingError, EngineContext},
    db_types::{GeoPoint, NewProvider, Offer, Provider, ProviderEarnings, ProviderId, ProviderReputation, ServiceCategory},
    traits::{BookingManagement, ProviderDirectory},
};

/// `ProviderApi` manages the provider directory and answers the questions a provider asks of the engine: which offers
/// are waiting, how am I rated, and what have I earned.
pub struct ProviderApi<B> {
    db: B,
    ctx: EngineContext,
}

impl<B> Debug for ProviderApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ProviderApi")
    }
}

impl<B> ProviderApi<B> {
    pub fn new(db: B, ctx: EngineContext) -> Self {
        Self { db, ctx }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> ProviderApi<B>
where B: ProviderDirectory + BookingManagement
{
    /// Adds a provider to the directory, or replaces its profile if it is already registered.
    pub async fn register_provider(&self, provider: NewProvider) -> Result<Provider, BookingError> {
        if !provider.position.is_valid() {
            return Err(BookingError::InvalidInput(format!("Invalid position for provider {}", provider.id)));
        }
        if !provider.service_radius_km.is_finite() || provider.service_radius_km <= 0.0 {
            return Err(BookingError::InvalidInput("The service radius must be a positive distance".into()));
        }
        if provider.categories.is_empty() {
            return Err(BookingError::InvalidInput("A provider must offer at least one category".into()));
        }
        let provider = self.db.register_provider(provider, self.ctx.now()).await?;
        info!("🧰️ Provider {} registered for {} categories", provider.id, provider.categories.len());
        Ok(provider)
    }

    pub async fn fetch_provider(&self, provider_id: &ProviderId) -> Result<Provider, BookingError> {
        self.db.fetch_provider(provider_id).await?.ok_or_else(|| BookingError::ProviderNotFound(provider_id.clone()))
    }

    /// Takes a provider on or off shift. Inactive providers are never offered new bookings, but keep the jobs they have.
    pub async fn set_active(&self, provider_id: &ProviderId, active: bool) -> Result<Provider, BookingError> {
        self.db.set_provider_active(provider_id, active, self.ctx.now()).await
    }

    /// Reputation starts empty. A provider that has never been rated gets a zeroed record.
    pub async fn reputation(&self, provider_id: &ProviderId) -> Result<ProviderReputation, BookingError> {
        let provider = self.fetch_provider(provider_id).await?;
        let reputation = self.db.fetch_reputation(provider_id).await?;
        Ok(reputation.unwrap_or_else(|| ProviderReputation::new(provider.id, provider.created_at)))
    }

    pub async fn earnings(&self, provider_id: &ProviderId) -> Result<ProviderEarnings, BookingError> {
        let provider = self.fetch_provider(provider_id).await?;
        let earnings = self.db.fetch_earnings(provider_id).await?;
        Ok(earnings.unwrap_or_else(|| ProviderEarnings::new(provider.id, provider.created_at)))
    }

    pub async fn offers_for_provider(&self, provider_id: &ProviderId, only_pending: bool) -> Result<Vec<Offer>, BookingError> {
        self.db.fetch_offers_for_provider(provider_id, only_pending).await
    }

    /// The providers to offer a booking to, nearest first, capped at the configured fan-out.
    pub async fn find_candidates(&self, point: &GeoPoint, category: &ServiceCategory) -> Result<Vec<Candidate>, BookingError> {
        find_candidates(&self.db, point, category, self.ctx.config.fan_out).await
    }
}
