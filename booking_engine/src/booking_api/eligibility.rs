//! Which providers may be offered a booking, and in what order.
use std::cmp::Ordering;

use log::*;

use crate::{
    booking_api::{booking_objects::Candidate, errors::BookingError},
    db_types::{GeoPoint, Provider, ServiceCategory},
    helpers::haversine_km,
    traits::ProviderDirectory,
};

/// The providers to offer a booking to, nearest first, capped at `fan_out`. An empty list means "no match".
pub async fn find_candidates<B: ProviderDirectory>(
    db: &B,
    point: &GeoPoint,
    category: &ServiceCategory,
    fan_out: usize,
) -> Result<Vec<Candidate>, BookingError> {
    let providers = db.fetch_active_providers_for_category(category).await?;
    let mut candidates = rank_candidates(point, category, &providers);
    trace!(
        "📡️ {} of {} active {category} providers are in range. Fan-out is {fan_out}",
        candidates.len(),
        providers.len()
    );
    candidates.truncate(fan_out);
    Ok(candidates)
}

/// Ranks the providers eligible for a booking at `point` in `category`.
///
/// A provider is eligible when it is active, offers the category, and `point` lies within its service radius. The
/// nearest provider comes first. Ties are broken on provider id so that the order is stable.
pub fn rank_candidates(point: &GeoPoint, category: &ServiceCategory, providers: &[Provider]) -> Vec<Candidate> {
    let mut candidates = providers
        .iter()
        .filter(|p| p.is_active && p.offers(category))
        .filter_map(|p| {
            let distance_km = haversine_km(&p.position, point);
            (distance_km <= p.service_radius_km).then(|| Candidate { provider_id: p.id.clone(), distance_km })
        })
        .collect::<Vec<_>>();
    candidates.sort_by(|a, b| match a.distance_km.total_cmp(&b.distance_km) {
        Ordering::Equal => a.provider_id.as_str().cmp(b.provider_id.as_str()),
        o => o,
    });
    candidates
}

#[cfg(test)]
mod test {
    use chrono::Utc;

    use super::*;
    use crate::db_types::{ProviderId, ProviderTier};

    fn provider(id: &str, lat: f64, lon: f64, radius: f64, category: &str) -> Provider {
        let now = Utc::now();
        Provider {
            id: ProviderId::from(id),
            display_name: id.to_uppercase(),
            categories: vec![category.parse().unwrap()],
            position: GeoPoint::new(lat, lon).unwrap(),
            service_radius_km: radius,
            is_active: true,
            tier: ProviderTier::Tier2,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn nearest_first() {
        let plumbing: ServiceCategory = "plumbing".parse().unwrap();
        let here = GeoPoint::new(12.9716, 77.5946).unwrap();
        let providers = vec![
            provider("far", 13.0300, 77.5946, 10.0, "plumbing"),
            provider("near", 12.9750, 77.5946, 10.0, "plumbing"),
            provider("mid", 13.0000, 77.5946, 10.0, "plumbing"),
        ];
        let ranked = rank_candidates(&here, &plumbing, &providers);
        let ids = ranked.iter().map(|c| c.provider_id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["near", "mid", "far"]);
        assert!(ranked[0].distance_km < ranked[1].distance_km);
    }

    #[test]
    fn ineligible_providers_are_skipped() {
        let plumbing: ServiceCategory = "plumbing".parse().unwrap();
        let here = GeoPoint::new(12.9716, 77.5946).unwrap();
        let mut inactive = provider("inactive", 12.9716, 77.5946, 10.0, "plumbing");
        inactive.is_active = false;
        let providers = vec![
            inactive,
            provider("electrician", 12.9716, 77.5946, 10.0, "electrical"),
            // ~6.7km away with a 5km radius
            provider("out_of_range", 13.0320, 77.5946, 5.0, "plumbing"),
            provider("ok", 12.9800, 77.5946, 5.0, "plumbing"),
        ];
        let ranked = rank_candidates(&here, &plumbing, &providers);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].provider_id.as_str(), "ok");
    }

    #[test]
    fn ties_break_on_id() {
        let cleaning: ServiceCategory = "cleaning".parse().unwrap();
        let here = GeoPoint::new(0.0, 0.0).unwrap();
        let providers = vec![provider("b", 0.01, 0.0, 5.0, "cleaning"), provider("a", 0.01, 0.0, 5.0, "cleaning")];
        let ranked = rank_candidates(&here, &cleaning, &providers);
        assert_eq!(ranked[0].provider_id.as_str(), "a");
        assert_eq!(ranked[1].provider_id.as_str(), "b");
    }
}
