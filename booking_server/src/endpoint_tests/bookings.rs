use actix_web::{http::StatusCode, test::TestRequest};
use serde_json::json;

use super::helpers::*;

#[actix_web::test]
async fn create_and_fetch_booking() {
    let sys = test_system().await;
    add_plumber(&sys, "priya", 1.2).await;
    add_plumber(&sys, "ravi", 3.0).await;
    let req = TestRequest::post().uri("/bookings").set_json(booking_request("anita", "plumbing", 45_000));
    let (status, body) = send(&sys, req).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["booking"]["status"], "DISPATCHING");
    assert_eq!(body["offers"].as_array().unwrap().len(), 2);
    assert_eq!(body["offers"][0]["provider_id"], "priya");
    assert!(body["booking"].get("handoff_code").is_none(), "The handoff code must never be serialized");

    let id = body["booking"]["id"].as_str().unwrap();
    let (status, booking) = get(&sys, &format!("/bookings/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(booking["customer_id"], "anita");
    assert_eq!(booking["version"], 2);
    let (status, history) = get(&sys, &format!("/bookings/{id}/history")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history.as_array().unwrap().len(), 2);
    sys.tear_down().await;
}

#[actix_web::test]
async fn rare_service_is_no_match() {
    let sys = test_system().await;
    add_plumber(&sys, "priya", 1.2).await;
    let req = TestRequest::post().uri("/bookings").set_json(booking_request("anita", "rare-service", 90_000));
    let (status, body) = send(&sys, req).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["booking"]["status"], "NO_MATCH");
    assert!(body["offers"].as_array().unwrap().is_empty());
    sys.tear_down().await;
}

#[actix_web::test]
async fn unknown_booking() {
    let sys = test_system().await;
    let (status, body) = get(&sys, "/bookings/no-such-booking").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("no-such-booking"));
    sys.tear_down().await;
}

#[actix_web::test]
async fn malformed_booking_request() {
    let sys = test_system().await;
    let req = TestRequest::post().uri("/bookings").set_json(json!({ "customer_id": "anita" }));
    let (status, body) = send(&sys, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().is_some());
    sys.tear_down().await;
}

#[actix_web::test]
async fn losing_an_accept_is_not_an_error() {
    let sys = test_system().await;
    add_plumber(&sys, "priya", 1.2).await;
    add_plumber(&sys, "ravi", 3.0).await;
    let id = create_booking(&sys, "anita").await;
    let (status, body) = post(&sys, &format!("/bookings/{id}/accept"), json!({ "provider_id": "ravi" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "WON");
    let (status, body) = post(&sys, &format!("/bookings/{id}/accept"), json!({ "provider_id": "priya" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "LOST");
    let (status, body) = post(&sys, &format!("/bookings/{id}/accept"), json!({ "provider_id": "stranger" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "INVALID");
    sys.tear_down().await;
}

#[actix_web::test]
async fn late_accept_has_expired() {
    let sys = test_system().await;
    add_plumber(&sys, "priya", 1.2).await;
    let id = create_booking(&sys, "anita").await;
    sys.advance(30);
    let (status, body) = post(&sys, &format!("/bookings/{id}/accept"), json!({ "provider_id": "priya" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "EXPIRED");
    let (_, booking) = get(&sys, &format!("/bookings/{id}")).await;
    assert_eq!(booking["status"], "EXPIRED");
    sys.tear_down().await;
}

#[actix_web::test]
async fn only_the_assigned_provider_may_act() {
    let sys = test_system().await;
    add_plumber(&sys, "priya", 1.2).await;
    add_plumber(&sys, "ravi", 3.0).await;
    let id = create_booking(&sys, "anita").await;
    post(&sys, &format!("/bookings/{id}/accept"), json!({ "provider_id": "priya" })).await;
    let (status, _) = post(&sys, &format!("/bookings/{id}/en_route"), json!({ "provider_id": "ravi" })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, body) = post(&sys, &format!("/bookings/{id}/en_route"), json!({ "provider_id": "priya" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "EN_ROUTE");

    let position = north_of_home(0.4);
    let update = json!({ "provider_id": "priya", "position": { "lat": position.lat, "lon": position.lon } });
    let (status, snapshot) = post(&sys, &format!("/bookings/{id}/position"), update).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(snapshot["status"], "EN_ROUTE");
    assert!(snapshot["position"].is_object());
    let (_, booking) = get(&sys, &format!("/bookings/{id}")).await;
    assert_eq!(booking["version"], 4, "Position updates do not change the booking");
    sys.tear_down().await;
}

#[actix_web::test]
async fn handoff_code_is_for_the_customer_only() {
    let sys = test_system().await;
    add_plumber(&sys, "priya", 1.2).await;
    let id = create_booking(&sys, "anita").await;
    post(&sys, &format!("/bookings/{id}/accept"), json!({ "provider_id": "priya" })).await;
    let (status, _) = get(&sys, &format!("/bookings/{id}/handoff_code?customer_id=mallory")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = post(&sys, &format!("/bookings/{id}/handoff"), json!({ "code": "nope" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "MISMATCH");

    let (status, body) = get(&sys, &format!("/bookings/{id}/handoff_code?customer_id=anita")).await;
    assert_eq!(status, StatusCode::OK);
    let code = body["code"].as_str().unwrap().to_string();
    let (_, body) = post(&sys, &format!("/bookings/{id}/handoff"), json!({ "code": code })).await;
    assert_eq!(body["outcome"], "OK");
    let (_, booking) = get(&sys, &format!("/bookings/{id}")).await;
    assert_eq!(booking["status"], "IN_PROGRESS");
    sys.tear_down().await;
}

#[actix_web::test]
async fn complete_pay_and_rate() {
    let sys = test_system().await;
    add_plumber(&sys, "priya", 1.2).await;
    let id = create_booking(&sys, "anita").await;
    post(&sys, &format!("/bookings/{id}/accept"), json!({ "provider_id": "priya" })).await;
    let (_, body) = get(&sys, &format!("/bookings/{id}/handoff_code?customer_id=anita")).await;
    post(&sys, &format!("/bookings/{id}/handoff"), json!({ "code": body["code"] })).await;

    let (status, booking) =
        post(&sys, &format!("/bookings/{id}/complete"), json!({ "provider_id": "priya", "final_amount": 50_000 })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(booking["status"], "PAYMENT_PENDING");
    let (status, receipt) = get(&sys, &format!("/bookings/{id}/receipt")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(receipt["amount"], 50_000);
    assert_eq!(receipt["commission"], 7_500);
    assert_eq!(receipt["status"], "PENDING");

    let (status, receipt) = post(&sys, &format!("/bookings/{id}/payment"), json!({ "method": "CASH" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(receipt["status"], "CAPTURED");
    let (status, _) = post(&sys, &format!("/bookings/{id}/payment"), json!({ "method": "CASH" })).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = post(&sys, &format!("/bookings/{id}/rating"), json!({ "rating": 9 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, body) =
        post(&sys, &format!("/bookings/{id}/rating"), json!({ "rating": 4, "comment": "Tidy work" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reputation"]["rated_jobs"], 1);
    let (status, _) = post(&sys, &format!("/bookings/{id}/rating"), json!({ "rating": 5 })).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, earnings) = get(&sys, "/providers/priya/earnings").await;
    assert_eq!(earnings["total_earned"], 42_500);
    sys.tear_down().await;
}

#[actix_web::test]
async fn cancel_rules() {
    let sys = test_system().await;
    add_plumber(&sys, "priya", 1.2).await;
    let id = create_booking(&sys, "anita").await;
    let (status, _) = post(&sys, &format!("/bookings/{id}/cancel"), json!({ "actor": "customer:mallory" })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, booking) = post(&sys, &format!("/bookings/{id}/cancel"), json!({ "actor": "customer:anita" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(booking["status"], "CANCELLED");
    assert_eq!(booking["cancelled_by"], "customer:anita");
    let (status, _) = post(&sys, &format!("/bookings/{id}/cancel"), json!({ "actor": "system" })).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (_, offers) = get(&sys, &format!("/bookings/{id}/offers")).await;
    assert!(offers.as_array().unwrap().iter().all(|o| o["status"] != "PENDING"));
    sys.tear_down().await;
}

#[actix_web::test]
async fn status_stream_closes_on_a_final_status() {
    let sys = test_system().await;
    add_plumber(&sys, "priya", 1.2).await;
    let id = create_booking(&sys, "anita").await;
    post(&sys, &format!("/bookings/{id}/cancel"), json!({ "actor": "customer:anita" })).await;
    let (status, body) = send_raw(&sys, TestRequest::get().uri(&format!("/bookings/{id}/stream"))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.starts_with("event: status\ndata: "));
    assert!(body.contains("\"status\":\"CANCELLED\""));
    assert_eq!(body.matches("event: status").count(), 1);
    sys.tear_down().await;
}
