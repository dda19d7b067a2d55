#![allow(dead_code)]
use booking_engine::{
    db_types::{CustomerId, GeoPoint, Location, Money, NewBooking, NewProvider, ProviderId, ProviderTier, ServiceCategory},
    test_utils::TestSystem,
};

/// Kilometres per degree of latitude on a sphere of radius 6371 km
pub const KM_PER_DEGREE: f64 = 111.195;

/// The customer's address in all the tests
pub fn home() -> GeoPoint {
    GeoPoint::new(12.9716, 77.5946).unwrap()
}

/// A point `km` kilometres due north of [`home`]
pub fn north_of_home(km: f64) -> GeoPoint {
    let h = home();
    GeoPoint::new(h.lat + km / KM_PER_DEGREE, h.lon).unwrap()
}

pub fn category(name: &str) -> ServiceCategory {
    name.parse().unwrap()
}

pub fn new_booking(customer: &str, cat: &str, price: i64) -> NewBooking {
    let location = Location::new(home(), "14 MG Road");
    NewBooking::new(CustomerId::from(customer), category(cat), location, Money::from(price))
}

pub async fn register_provider(sys: &TestSystem, id: &str, cat: &str, km: f64, tier: ProviderTier) -> ProviderId {
    let provider = NewProvider::new(ProviderId::from(id), id.to_uppercase(), north_of_home(km), 10.0)
        .with_category(category(cat))
        .with_tier(tier);
    sys.providers.register_provider(provider).await.expect("Error registering provider").id
}

pub async fn register_plumbers(sys: &TestSystem, distances: &[f64]) -> Vec<ProviderId> {
    let mut ids = Vec::with_capacity(distances.len());
    for (i, km) in distances.iter().enumerate() {
        ids.push(register_provider(sys, &format!("plumber{:02}", i + 1), "plumbing", *km, ProviderTier::Tier2).await);
    }
    ids
}
