use actix_web::{http::StatusCode, test, test::TestRequest, App};
use booking_engine::{
    config::EngineConfig,
    db_types::{GeoPoint, NewProvider, ProviderId, ServiceCategory},
    test_utils::TestSystem,
};
use log::debug;
use serde_json::{json, Value};

use crate::server::configure_app;

pub const KM_PER_DEGREE: f64 = 111.195;
pub const HOME: (f64, f64) = (12.9716, 77.5946);

pub async fn test_system() -> TestSystem {
    let _ = env_logger::try_init();
    TestSystem::new(EngineConfig::default()).await
}

/// Sends a request to a fresh app wired to the test system's database and clock, and returns the status and the JSON
/// body (or `Value::Null` if the body is not JSON).
pub async fn send(sys: &TestSystem, req: TestRequest) -> (StatusCode, Value) {
    let (status, body) = send_raw(sys, req).await;
    let json = serde_json::from_str(&body).unwrap_or(Value::Null);
    (status, json)
}

pub async fn send_raw(sys: &TestSystem, req: TestRequest) -> (StatusCode, String) {
    let db = sys.db.clone();
    let ctx = sys.ctx.clone();
    let app = test::init_service(App::new().configure(move |cfg| configure_app(cfg, db, ctx))).await;
    let res = test::call_service(&app, req.to_request()).await;
    let status = res.status();
    let body = test::read_body(res).await;
    let body = String::from_utf8_lossy(&body).into_owned();
    debug!("Response: {status} {body}");
    (status, body)
}

pub fn north_of_home(km: f64) -> GeoPoint {
    GeoPoint::new(HOME.0 + km / KM_PER_DEGREE, HOME.1).unwrap()
}

pub async fn add_plumber(sys: &TestSystem, id: &str, km: f64) -> ProviderId {
    let category: ServiceCategory = "plumbing".parse().unwrap();
    let provider = NewProvider::new(ProviderId::from(id), id, north_of_home(km), 10.0).with_category(category);
    sys.providers.register_provider(provider).await.unwrap().id
}

pub fn booking_request(customer: &str, category: &str, price: i64) -> Value {
    json!({
        "customer_id": customer,
        "category": category,
        "location": { "point": { "lat": HOME.0, "lon": HOME.1 }, "address": "14 MG Road" },
        "price": price
    })
}

/// Creates a booking over HTTP and returns its id.
pub async fn create_booking(sys: &TestSystem, customer: &str) -> String {
    let req = TestRequest::post().uri("/bookings").set_json(booking_request(customer, "plumbing", 45_000));
    let (status, body) = send(sys, req).await;
    assert_eq!(status, StatusCode::CREATED);
    body["booking"]["id"].as_str().unwrap().to_string()
}

pub async fn post(sys: &TestSystem, uri: &str, body: Value) -> (StatusCode, Value) {
    send(sys, TestRequest::post().uri(uri).set_json(body)).await
}

pub async fn get(sys: &TestSystem, uri: &str) -> (StatusCode, Value) {
    send(sys, TestRequest::get().uri(uri)).await
}
