use actix_web::{http::StatusCode, test::TestRequest};
use serde_json::json;

use super::helpers::*;

fn provider_request(id: &str, km: f64) -> serde_json::Value {
    let position = north_of_home(km);
    json!({
        "id": id,
        "display_name": id.to_uppercase(),
        "categories": ["Plumbing", "electrical"],
        "position": { "lat": position.lat, "lon": position.lon },
        "service_radius_km": 8.0,
        "tier": "TIER_1"
    })
}

#[actix_web::test]
async fn register_and_fetch_provider() {
    let sys = test_system().await;
    let (status, body) = post(&sys, "/providers", provider_request("priya", 1.0)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["id"], "priya");
    assert_eq!(body["is_active"], true);
    assert_eq!(body["categories"], json!(["plumbing", "electrical"]));

    let (status, body) = get(&sys, "/providers/priya").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tier"], "TIER_1");
    let (status, _) = get(&sys, "/providers/nobody").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    sys.tear_down().await;
}

#[actix_web::test]
async fn invalid_provider_is_rejected() {
    let sys = test_system().await;
    let mut request = provider_request("priya", 1.0);
    request["service_radius_km"] = json!(0.0);
    let (status, _) = post(&sys, "/providers", request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    sys.tear_down().await;
}

#[actix_web::test]
async fn inactive_providers_get_no_offers() {
    let sys = test_system().await;
    post(&sys, "/providers", provider_request("priya", 1.0)).await;
    let (status, body) = post(&sys, "/providers/priya/active", json!({ "active": false })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_active"], false);
    let req = TestRequest::post().uri("/bookings").set_json(booking_request("anita", "plumbing", 45_000));
    let (_, round) = send(&sys, req).await;
    assert_eq!(round["booking"]["status"], "NO_MATCH");

    post(&sys, "/providers/priya/active", json!({ "active": true })).await;
    let id = create_booking(&sys, "bala").await;
    let (status, inbox) = get(&sys, "/providers/priya/offers?pending_only=true").await;
    assert_eq!(status, StatusCode::OK);
    let inbox = inbox.as_array().unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0]["booking_id"], id.as_str());
    sys.tear_down().await;
}

#[actix_web::test]
async fn new_providers_have_no_reputation_yet() {
    let sys = test_system().await;
    post(&sys, "/providers", provider_request("priya", 1.0)).await;
    let (status, body) = get(&sys, "/providers/priya/reputation").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rated_jobs"], 0);
    let (status, _) = get(&sys, "/providers/nobody/reputation").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    sys.tear_down().await;
}
