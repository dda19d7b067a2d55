use std::time::Duration;

use booking_engine::{
    db_types::{
        Actor,
        BookingStatusType,
        CustomerId,
        GeoPoint,
        Location,
        Money,
        NewBooking,
        NewProvider,
        OfferStatusType,
        PaymentMethod,
        ProviderId,
        ProviderTier,
        ServiceCategory,
    },
    BookingError,
};
use cucumber::{given, then, when};
use futures_util::future::join_all;
use log::*;

use crate::cucumber::BookingWorld;

const KM_PER_DEGREE: f64 = 111.195;

fn customer_home() -> GeoPoint {
    GeoPoint::new(12.9716, 77.5946).expect("Invalid home location")
}

fn category(name: &str) -> ServiceCategory {
    name.parse().expect("Invalid service category")
}

fn tier(n: i64) -> ProviderTier {
    match n {
        1 => ProviderTier::Tier1,
        2 => ProviderTier::Tier2,
        3 => ProviderTier::Tier3,
        _ => panic!("There is no tier {n}"),
    }
}

async fn register(world: &mut BookingWorld, name: String, service: String, km: f64, tier: ProviderTier) {
    let home = customer_home();
    let position = GeoPoint::new(home.lat + km / KM_PER_DEGREE, home.lon).expect("Invalid provider position");
    let provider = NewProvider::new(ProviderId::from(name.as_str()), name.clone(), position, 10.0)
        .with_category(category(&service))
        .with_tier(tier);
    let provider = world.system().providers.register_provider(provider).await.expect("Error registering provider");
    world.providers.insert(name, provider.id);
}

#[given(expr = "a {word} named '{word}' who is {float} km from the customer")]
async fn provider_nearby(world: &mut BookingWorld, service: String, name: String, km: f64) {
    register(world, name, service, km, ProviderTier::default()).await;
}

#[given(expr = "a tier {int} {word} named '{word}' who is {float} km from the customer")]
async fn tiered_provider_nearby(world: &mut BookingWorld, n: i64, service: String, name: String, km: f64) {
    register(world, name, service, km, tier(n)).await;
}

#[when(expr = "customer '{word}' books {word} for {int} paise")]
async fn book(world: &mut BookingWorld, customer: String, service: String, price: i64) {
    let location = Location::new(customer_home(), "14 MG Road");
    let booking = NewBooking::new(CustomerId::from(customer.as_str()), category(&service), location, Money::from(price));
    let round = world.system().flow.create_booking(booking).await.expect("Error creating booking");
    debug!("🚀️ Booking {} created with {} offers", round.booking.id, round.offers.len());
    world.bookings.insert(customer, round.booking.id);
}

#[when(expr = "'{word}' and '{word}' accept the booking for '{word}' at the same time")]
async fn accept_together(world: &mut BookingWorld, first: String, second: String, customer: String) {
    let id = world.booking(&customer);
    let racers = [first, second];
    let providers = racers.iter().map(|name| world.provider(name)).collect::<Vec<_>>();
    let flow = &world.system().flow;
    let outcomes = join_all(providers.iter().map(|p| flow.accept(&id, p))).await;
    for (name, outcome) in racers.into_iter().zip(outcomes) {
        let outcome = outcome.expect("Error accepting booking");
        debug!("🚀️ {name} tried to accept booking {id}: {outcome}");
        world.accepts.insert(name, outcome);
    }
}

#[when(expr = "'{word}' accepts the booking for '{word}'")]
async fn accept(world: &mut BookingWorld, provider: String, customer: String) {
    let id = world.booking(&customer);
    let provider_id = world.provider(&provider);
    let outcome = world.system().flow.accept(&id, &provider_id).await.expect("Error accepting booking");
    world.accepts.insert(provider, outcome);
}

#[when(expr = "'{word}' declines the booking for '{word}'")]
async fn decline(world: &mut BookingWorld, provider: String, customer: String) {
    let id = world.booking(&customer);
    let provider_id = world.provider(&provider);
    world.system().flow.decline(&id, &provider_id).await.expect("Error declining booking");
}

#[when(expr = "{int} seconds pass")]
async fn time_passes(world: &mut BookingWorld, seconds: i64) {
    world.system().advance(seconds);
}

#[when("the dispatch sweeper runs")]
async fn sweep(world: &mut BookingWorld) {
    let expired = world.system().flow.expire_overdue_dispatches().await.expect("Error expiring dispatches");
    debug!("🚀️ Sweeper expired {} bookings", expired.len());
}

#[when(expr = "I pause for {int}ms")]
async fn pause(_world: &mut BookingWorld, ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

#[when(expr = "'{word}' heads out to '{word}'")]
async fn en_route(world: &mut BookingWorld, provider: String, customer: String) {
    let id = world.booking(&customer);
    let provider_id = world.provider(&provider);
    world.system().flow.mark_en_route(&id, &provider_id).await.expect("Error marking booking en route");
}

#[when(expr = "'{word}' tells the provider the handoff code")]
async fn share_code(world: &mut BookingWorld, customer: String) {
    let id = world.booking(&customer);
    let code = world
        .system()
        .flow
        .reveal_handoff_code(&id, &CustomerId::from(customer.as_str()))
        .await
        .expect("Error revealing handoff code");
    world.shared_codes.insert(customer, code.reveal().clone());
}

async fn verify_code(world: &mut BookingWorld, code: &str, customer: &str) {
    let id = world.booking(customer);
    let outcome = world.system().flow.verify_handoff(&id, code).await.expect("Error verifying handoff");
    world.last_handoff = Some(outcome);
}

#[when(expr = "the provider enters the code '{word}' for '{word}'")]
async fn enter_code(world: &mut BookingWorld, code: String, customer: String) {
    verify_code(world, &code, &customer).await;
}

#[when(expr = "the provider enters the code they were told by '{word}'")]
async fn enter_shared_code(world: &mut BookingWorld, customer: String) {
    let code = world.shared_codes.get(&customer).cloned().expect("No code was shared");
    verify_code(world, &code, &customer).await;
}

#[when(expr = "'{word}' finishes the job for '{word}' at {int} paise")]
async fn complete(world: &mut BookingWorld, provider: String, customer: String, amount: i64) {
    let id = world.booking(&customer);
    let provider_id = world.provider(&provider);
    world.system().flow.mark_completed(&id, &provider_id, Money::from(amount)).await.expect("Error completing job");
}

#[when(expr = "'{word}' pays in cash")]
async fn pay_cash(world: &mut BookingWorld, customer: String) {
    let id = world.booking(&customer);
    let result = world.system().settlement.capture_payment(&id, PaymentMethod::Cash).await;
    match result {
        Ok(receipt) => debug!("🚀️ Payment captured: {:?}", receipt.gateway_reference),
        Err(e) => world.last_error = Some(e),
    }
}

#[when(expr = "'{word}' rates the job {int} stars")]
async fn rate(world: &mut BookingWorld, customer: String, stars: u8) {
    let id = world.booking(&customer);
    world.last_error = world.system().settlement.submit_rating(&id, stars, None).await.err();
}

#[when(expr = "'{word}' cancels the booking")]
async fn customer_cancels(world: &mut BookingWorld, customer: String) {
    let id = world.booking(&customer);
    let actor = Actor::Customer(CustomerId::from(customer.as_str()));
    world.last_error = world.system().flow.cancel(&id, actor).await.err();
}

#[then(expr = "the booking for '{word}' is {word}")]
async fn booking_status(world: &mut BookingWorld, customer: String, status: String) {
    let expected = status.parse::<BookingStatusType>().expect("Not a booking status");
    let booking = world.system().flow.fetch_booking(&world.booking(&customer)).await.expect("Error fetching booking");
    assert_eq!(booking.status, expected, "Booking for {customer} is in the wrong state");
}

#[then(expr = "{int} offer(s) went out for '{word}'")]
async fn offers_sent(world: &mut BookingWorld, count: usize, customer: String) {
    let offers =
        world.system().flow.offers_for_booking(&world.booking(&customer)).await.expect("Error fetching offers");
    assert_eq!(offers.len(), count);
}

#[then(expr = "no offer for '{word}' is still pending")]
async fn no_pending_offers(world: &mut BookingWorld, customer: String) {
    let offers =
        world.system().flow.offers_for_booking(&world.booking(&customer)).await.expect("Error fetching offers");
    let pending = offers.iter().filter(|o| o.status == OfferStatusType::Pending).count();
    assert_eq!(pending, 0, "{pending} offers were left pending");
}

#[then(expr = "exactly one of '{word}' and '{word}' won")]
async fn one_winner(world: &mut BookingWorld, first: String, second: String) {
    let outcomes = [&first, &second].map(|name| world.accepts.get(name).map(|o| o.to_string()));
    let won = outcomes.iter().filter(|o| o.as_deref() == Some("WON")).count();
    let lost = outcomes.iter().filter(|o| o.as_deref() == Some("LOST")).count();
    assert_eq!((won, lost), (1, 1), "Expected one winner and one loser, got {outcomes:?}");
}

#[then(expr = "the accept by '{word}' was {word}")]
async fn accept_outcome(world: &mut BookingWorld, provider: String, outcome: String) {
    let actual = world.accepts.get(&provider).unwrap_or_else(|| panic!("{provider} never tried to accept"));
    assert_eq!(actual.to_string(), outcome);
}

#[then(expr = "the booking for '{word}' belongs to the winner")]
async fn bound_to_winner(world: &mut BookingWorld, customer: String) {
    let booking = world.system().flow.fetch_booking(&world.booking(&customer)).await.expect("Error fetching booking");
    let winner = world
        .accepts
        .iter()
        .find(|(_, o)| o.to_string() == "WON")
        .map(|(name, _)| world.provider(name))
        .expect("Nobody won");
    assert_eq!(booking.provider_id, Some(winner));
}

#[then(expr = "the handoff result is {word}")]
async fn handoff_outcome(world: &mut BookingWorld, outcome: String) {
    let actual = world.last_handoff.as_ref().expect("No handoff was attempted");
    assert_eq!(actual.to_string(), outcome);
}

#[then(expr = "the receipt for '{word}' shows a commission of {int} paise")]
async fn receipt_commission(world: &mut BookingWorld, customer: String, commission: i64) {
    let receipt = world
        .system()
        .settlement
        .fetch_receipt(&world.booking(&customer))
        .await
        .expect("Error fetching receipt")
        .expect("No receipt was issued");
    assert_eq!(receipt.commission, Money::from(commission));
}

#[then("the request was rejected as a duplicate")]
async fn duplicate(world: &mut BookingWorld) {
    let err = world.last_error.take().expect("The request succeeded");
    assert!(matches!(err, BookingError::DuplicateOperation(_)), "Unexpected error: {err}");
}

#[then("the request was refused")]
async fn refused(world: &mut BookingWorld) {
    let err = world.last_error.take().expect("The request succeeded");
    assert!(!err.is_retryable(), "Unexpected error: {err}");
}

#[then(expr = "'{word}' has {int} rated job(s) averaging {float} stars")]
async fn reputation(world: &mut BookingWorld, provider: String, jobs: i64, average: f64) {
    let reputation =
        world.system().providers.reputation(&world.provider(&provider)).await.expect("Error fetching reputation");
    assert_eq!(reputation.rated_jobs, jobs);
    assert!((reputation.average_rating - average).abs() < 1e-9, "Average is {}", reputation.average_rating);
}

#[then(expr = "'{word}' has earned {int} paise from {int} job(s)")]
async fn earnings(world: &mut BookingWorld, provider: String, total: i64, jobs: i64) {
    let earnings =
        world.system().providers.earnings(&world.provider(&provider)).await.expect("Error fetching earnings");
    assert_eq!(earnings.total_earned, Money::from(total));
    assert_eq!(earnings.paid_jobs, jobs);
}
