mod common;

use axum::http::StatusCode;
use chrono::Weekday;
use common::{at, upcoming, TestApp};
use serde_json::json;

async fn add_policy(app: &TestApp, business_id: &str, hours_before: i32, penalty_percent: i32, is_default: bool) -> String {
    let (status, body) = app.post(&format!("/api/v1/{}/cancellation-policies", business_id), json!({
        "name": format!("{}h / {}%", hours_before, penalty_percent),
        "hours_before": hours_before,
        "penalty_percent": penalty_percent,
        "is_default": is_default
    })).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_cancel_inside_notice_window_charges_penalty() {
    let app = TestApp::new().await;
    let setup = app.standard_setup().await;
    // Any upcoming slot is well inside a 60 day notice window
    add_policy(&app, &setup.business_id, 24 * 60, 50, true).await;
    let monday = upcoming(Weekday::Mon);

    let (_, booking) = app.book(&setup, &at(monday, 10, 0), "cust-1").await;
    let uri = format!("/api/v1/{}/bookings/{}/cancel", setup.business_id, booking["id"].as_str().unwrap());

    let (status, body) = app.post(&uri, json!({ "reason": "sick" })).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["penalty_cents"], 5000);
    assert_eq!(body["refund_cents"], 5000);
    assert_eq!(body["booking"]["status"], "cancelled");
    assert_eq!(body["booking"]["cancellation_reason"], "sick");
    assert_eq!(body["booking"]["penalty_cents"], 5000);

    // Cancelling twice is a state conflict
    let (status, _) = app.post(&uri, json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_cancel_with_enough_notice_is_free() {
    let app = TestApp::new().await;
    let setup = app.standard_setup().await;
    add_policy(&app, &setup.business_id, 1, 100, true).await;
    let monday = upcoming(Weekday::Mon);

    let (_, booking) = app.book(&setup, &at(monday, 10, 0), "cust-1").await;
    let (status, body) = app.post(
        &format!("/api/v1/{}/bookings/{}/cancel", setup.business_id, booking["id"].as_str().unwrap()),
        json!({}),
    ).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["penalty_cents"], 0);
    assert_eq!(body["refund_cents"], 10000);
}

#[tokio::test]
async fn test_service_policy_overrides_business_default() {
    let app = TestApp::new().await;
    let business_id = app.create_business().await;
    let resource_id = app.create_resource(&business_id, "Room A", 1).await;
    add_policy(&app, &business_id, 24 * 60, 50, true).await;
    let strict = add_policy(&app, &business_id, 24 * 60, 100, false).await;

    let service_id = app.create_service(&business_id, &resource_id, json!({
        "name": "Workshop",
        "duration_min": 120,
        "base_price_cents": 20000,
        "currency": "USD",
        "cancellation_policy_id": strict
    })).await;
    let monday = upcoming(Weekday::Mon);

    let (_, booking) = app.post(&format!("/api/v1/{}/bookings", business_id), json!({
        "service_id": service_id,
        "customer_id": "cust-1",
        "start": at(monday, 9, 0)
    })).await;
    let (_, body) = app.post(
        &format!("/api/v1/{}/bookings/{}/cancel", business_id, booking["id"].as_str().unwrap()),
        json!({}),
    ).await;
    assert_eq!(body["penalty_cents"], 20000);
    assert_eq!(body["refund_cents"], 0);
}

#[tokio::test]
async fn test_cancel_without_policy_refunds_in_full() {
    let app = TestApp::new().await;
    let setup = app.standard_setup().await;
    let monday = upcoming(Weekday::Mon);

    let (_, booking) = app.book(&setup, &at(monday, 10, 0), "cust-1").await;
    let (status, body) = app.post(
        &format!("/api/v1/{}/bookings/{}/cancel", setup.business_id, booking["id"].as_str().unwrap()),
        json!({}),
    ).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["penalty_cents"], 0);
    assert_eq!(body["refund_cents"], 10000);
}

#[tokio::test]
async fn test_cancelled_slot_can_be_booked_again() {
    let app = TestApp::new().await;
    let setup = app.standard_setup().await;
    let monday = upcoming(Weekday::Mon);

    let (_, booking) = app.book(&setup, &at(monday, 10, 0), "cust-1").await;
    let (status, _) = app.book(&setup, &at(monday, 10, 0), "cust-2").await;
    assert_eq!(status, StatusCode::CONFLICT);

    app.post(
        &format!("/api/v1/{}/bookings/{}/cancel", setup.business_id, booking["id"].as_str().unwrap()),
        json!({}),
    ).await;

    let (status, _) = app.book(&setup, &at(monday, 10, 0), "cust-2").await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, outbox) = app.get(&format!("/api/v1/{}/notifications", setup.business_id)).await;
    let cancelled: Vec<_> = outbox.as_array().unwrap().iter()
        .filter(|n| n["kind"] == "booking_cancelled")
        .collect();
    assert_eq!(cancelled.len(), 1);
    assert_eq!(cancelled[0]["payload"]["booking_id"], booking["id"]);
}
